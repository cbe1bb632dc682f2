//! Persistence calls made by the relay core.
//!
//! The relay never touches the database directly; it goes through a [`Gateway`] so
//! tests can swap in [`MemoryGateway`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::db::{Message, MessageId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no user with id {0}")]
    UnknownUser(UserId),
    #[error("store rejected the write: {0}")]
    Rejected(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Durably records a message and returns the id the store assigned to it.
    async fn save_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        timestamp: OffsetDateTime,
    ) -> Result<MessageId, GatewayError>;

    async fn set_online(&self, user_id: UserId, online: bool) -> Result<(), GatewayError>;

    async fn resolve_username(&self, user_id: UserId) -> Result<String, GatewayError>;
}

#[derive(Clone)]
pub struct SqliteGateway {
    db_pool: SqlitePool,
}

impl SqliteGateway {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl Gateway for SqliteGateway {
    async fn save_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        timestamp: OffsetDateTime,
    ) -> Result<MessageId, GatewayError> {
        let res = sqlx::query("INSERT INTO messages (sender_id,receiver_id,content,timestamp) VALUES (?,?,?,?)")
            .bind(sender_id)
            .bind(receiver_id)
            .bind(content)
            .bind(timestamp)
            .execute(&self.db_pool)
            .await?;
        Ok(res.last_insert_rowid())
    }

    async fn set_online(&self, user_id: UserId, online: bool) -> Result<(), GatewayError> {
        let res = sqlx::query("UPDATE users SET online=? WHERE id=?")
            .bind(online)
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(GatewayError::UnknownUser(user_id));
        }
        Ok(())
    }

    async fn resolve_username(&self, user_id: UserId) -> Result<String, GatewayError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE id=?")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?;
        row.map(|(username,)| username).ok_or(GatewayError::UnknownUser(user_id))
    }
}

/// In-process gateway. Holds users and messages in memory and can be told to
/// reject writes.
#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<MemoryStore>,
}

#[derive(Default)]
struct MemoryStore {
    users: HashMap<UserId, (String, bool)>,
    messages: Vec<Message>,
    reject_writes: bool,
    save_calls: usize,
}

impl MemoryGateway {
    pub fn with_users<'a>(users: impl IntoIterator<Item = (UserId, &'a str)>) -> Self {
        let gateway = Self::default();
        {
            let mut store = gateway.inner.lock();
            for (id, name) in users {
                store.users.insert(id, (name.to_owned(), false));
            }
        }
        gateway
    }

    pub fn reject_writes(&self, reject: bool) {
        self.inner.lock().reject_writes = reject;
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().messages.clone()
    }

    /// Number of `save_message` calls, successful or not.
    pub fn save_calls(&self) -> usize {
        self.inner.lock().save_calls
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.inner.lock().users.get(&user_id).is_some_and(|(_, online)| *online)
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn save_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        timestamp: OffsetDateTime,
    ) -> Result<MessageId, GatewayError> {
        let mut store = self.inner.lock();
        store.save_calls += 1;
        if store.reject_writes {
            return Err(GatewayError::Rejected("writes disabled".to_owned()));
        }

        let id = store.messages.last().map_or(1, |m| m.id + 1);
        store.messages.push(Message {
            id,
            sender_id,
            receiver_id,
            content: content.to_owned(),
            timestamp,
        });
        Ok(id)
    }

    async fn set_online(&self, user_id: UserId, online: bool) -> Result<(), GatewayError> {
        let mut store = self.inner.lock();
        if store.reject_writes {
            return Err(GatewayError::Rejected("writes disabled".to_owned()));
        }
        let (_, flag) = store.users.get_mut(&user_id).ok_or(GatewayError::UnknownUser(user_id))?;
        *flag = online;
        Ok(())
    }

    async fn resolve_username(&self, user_id: UserId) -> Result<String, GatewayError> {
        self.inner
            .lock()
            .users
            .get(&user_id)
            .map(|(name, _)| name.clone())
            .ok_or(GatewayError::UnknownUser(user_id))
    }
}
