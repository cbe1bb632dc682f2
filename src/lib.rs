pub mod api;
pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod gateway;
pub mod relay;
pub mod session;

use std::path::Path;

use axum::{extract::FromRef, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};
pub use relay::Relay;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub relay: Relay,
}

/// Every route the server exposes, with static files as the fallback.
pub fn app(app_state: AppState, static_dir: &Path, session_idle_minutes: i64) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(session_idle_minutes)));

    Router::new()
        .merge(relay::router())
        .nest("/api", auth::router().merge(api::router()))
        .fallback_service(ServeDir::new(static_dir))

        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
