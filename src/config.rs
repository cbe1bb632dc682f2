use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::Context;

/// Sizes of the queues between sessions, the router and the fan-out worker.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    pub delivery_queue_capacity: usize,
    pub outbox_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            delivery_queue_capacity: 256,
            outbox_capacity: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub seed_users: bool,
    pub bcrypt_cost: u32,
    pub session_idle_minutes: i64,
    pub relay: RelayConfig,
}

impl Config {
    /// Reads the environment (and `.env`, if present).
    pub fn from_env() -> anyhow::Result<Config> {
        let relay = RelayConfig::default();
        Ok(Config {
            database_url: dotenv::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://chat.db?mode=rwc".to_owned()),
            bind_addr: var_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            static_dir: var_or("STATIC_DIR", PathBuf::from("./static"))?,
            seed_users: var_or("SEED_USERS", true)?,
            bcrypt_cost: var_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            session_idle_minutes: var_or("SESSION_IDLE_MINUTES", 60)?,
            relay: RelayConfig {
                delivery_queue_capacity: var_or("DELIVERY_QUEUE_CAPACITY", relay.delivery_queue_capacity)?,
                outbox_capacity: var_or("OUTBOX_CAPACITY", relay.outbox_capacity)?,
            },
        })
    }
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value {value:?} for {key}")),
        Err(_) => Ok(default),
    }
}
