use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    error::RouteError,
    frames::{Direction, ServerFrame},
    registry::Registry,
};
use crate::{
    db::{Message, UserId},
    gateway::Gateway,
};

/// Persists direct messages and hands them to the fan-out worker.
#[derive(Clone)]
pub struct MessageRouter {
    gateway: Arc<dyn Gateway>,
    queue: mpsc::Sender<Message>,
}

/// Drains the router's queue and delivers each message to whichever of its
/// two parties is connected.
pub struct FanOut {
    registry: Arc<Registry>,
    queue: mpsc::Receiver<Message>,
}

impl MessageRouter {
    pub fn new(gateway: Arc<dyn Gateway>, registry: Arc<Registry>, capacity: usize) -> (Self, FanOut) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self { gateway, queue: tx },
            FanOut { registry, queue: rx },
        )
    }

    pub async fn route(&self, sender_id: UserId, receiver_id: UserId, content: &str) -> Result<Message, RouteError> {
        if sender_id <= 0 || receiver_id <= 0 {
            return Err(RouteError::InvalidAddress { sender: sender_id, receiver: receiver_id });
        }
        if content.trim().is_empty() {
            return Err(RouteError::EmptyContent);
        }

        let timestamp = OffsetDateTime::now_utc();
        let id = self
            .gateway
            .save_message(sender_id, receiver_id, content, timestamp)
            .await
            .map_err(RouteError::Persistence)?;

        let message = Message {
            id,
            sender_id,
            receiver_id,
            content: content.to_owned(),
            timestamp,
        };

        // already durable; history replay covers anything the fan-out misses
        if self.queue.send(message.clone()).await.is_err() {
            warn!("fan-out stopped, message #{id} saved but not delivered");
        }

        Ok(message)
    }
}

impl FanOut {
    /// Runs until every [`MessageRouter`] clone is dropped.
    pub async fn run(mut self) {
        while let Some(message) = self.queue.recv().await {
            self.deliver(&message);
        }
        info!("delivery queue closed, fan-out stopping");
    }

    pub fn deliver(&self, message: &Message) {
        let parties = [
            (message.sender_id, Direction::Outgoing),
            (message.receiver_id, Direction::Incoming),
        ];

        for (user_id, direction) in parties {
            let Some(handle) = self.registry.lookup(user_id) else {
                debug!("u/{user_id} offline, message #{} left for history", message.id);
                continue;
            };

            let frame = ServerFrame::Message { message: message.clone(), direction };
            if let Err(err) = handle.deliver(frame) {
                warn!("delivery of #{} to u/{user_id} failed: {err}", message.id);
                self.registry.evict(&handle);
            }
        }
    }
}
