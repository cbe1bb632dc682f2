use std::sync::Arc;

use anyhow::Context;
use directline::{app, config::Config, db, gateway::SqliteGateway, AppState, Relay};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("directline=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;

    db::bootstrap(&db_pool).await?;
    if config.seed_users {
        db::seed_users(&db_pool, &db::DEMO_USERS, config.bcrypt_cost).await?;
    }

    let (relay, fan_out) = Relay::new(Arc::new(SqliteGateway::new(db_pool.clone())), config.relay);
    tokio::spawn(fan_out.run());

    let app_state = AppState { db_pool, relay };
    let app = app(app_state, &config.static_dir, config.session_idle_minutes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
