use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{info, warn};

pub type UserId = i64;
pub type MessageId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub online: bool,
}

/// A direct message as it was durably recorded. Never mutated after the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

pub const DEMO_USERS: [(&str, &str); 4] = [
    ("alice", "password123"),
    ("bob", "password123"),
    ("charlie", "password123"),
    ("diana", "password123"),
];

const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    online BOOLEAN NOT NULL DEFAULT 0
)"#;

const CREATE_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id INTEGER NOT NULL,
    receiver_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    timestamp DATETIME NOT NULL,
    FOREIGN KEY (sender_id) REFERENCES users(id),
    FOREIGN KEY (receiver_id) REFERENCES users(id)
)"#;

/// Creates the schema if missing and clears online flags left over from a previous run.
pub async fn bootstrap(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_USERS).execute(db_pool).await?;
    sqlx::query(CREATE_MESSAGES).execute(db_pool).await?;

    let stale = sqlx::query("UPDATE users SET online = 0 WHERE online != 0")
        .execute(db_pool)
        .await?
        .rows_affected();
    if stale > 0 {
        info!("cleared {stale} stale online flags");
    }

    Ok(())
}

pub async fn seed_users(db_pool: &SqlitePool, users: &[(&str, &str)], cost: u32) -> anyhow::Result<()> {
    for &(username, password) in users {
        let hashed = bcrypt::hash(password, cost)?;
        let inserted = sqlx::query("INSERT OR IGNORE INTO users (username,password) VALUES (?,?)")
            .bind(username)
            .bind(hashed)
            .execute(db_pool)
            .await;

        match inserted {
            Ok(res) if res.rows_affected() > 0 => info!("adding @{username}"),
            Ok(_) => {}
            Err(err) => warn!("could not seed @{username}: {err}"),
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}
