use crate::{db::UserId, gateway::GatewayError};

/// Why a message could not be routed. Reported back to whoever called the router.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid address: sender {sender}, receiver {receiver}")]
    InvalidAddress { sender: UserId, receiver: UserId },
    #[error("message content is empty")]
    EmptyContent,
    #[error("could not persist message")]
    Persistence(#[source] GatewayError),
}

/// A write to one connection failed. Local to that connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection is closed")]
    Closed,
    #[error("connection outbox is full")]
    Lagging,
}

/// Ends a single session, never the process.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("undecodable frame: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("transport failed: {0}")]
    Transport(String),
}
