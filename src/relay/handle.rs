use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::{error::DeliveryError, frames::ServerFrame};
use crate::db::UserId;

pub type ConnectionHandle = Arc<Connection>;

/// The writable side of one physical connection.
///
/// Frames pushed with [`Connection::deliver`] land in a bounded outbox that the
/// owning session drains onto the socket. Once closed, a connection accepts no
/// more frames and its session stops reading.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    user_id: UserId,
    outbox: mpsc::Sender<ServerFrame>,
    closed: watch::Sender<bool>,
}

impl Connection {
    pub fn open(user_id: UserId, capacity: usize) -> (ConnectionHandle, mpsc::Receiver<ServerFrame>) {
        let (outbox, rx) = mpsc::channel(capacity.max(1));
        let conn = Connection {
            id: Uuid::now_v7(),
            user_id,
            outbox,
            closed: watch::Sender::new(false),
        };
        (Arc::new(conn), rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Queues a frame without waiting.
    pub fn deliver(&self, frame: ServerFrame) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.outbox.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Idempotent. Returns true only for the call that actually closed it.
    pub fn close(&self) -> bool {
        !self.closed.send_replace(true)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
