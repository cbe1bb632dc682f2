//! Live connections: who is online, and getting messages to them.

mod error;
mod frames;
mod handle;
mod presence;
mod registry;
mod router;
mod session;
mod ws;

use std::sync::Arc;

use axum::{routing::get, Router};

pub use error::{DeliveryError, RouteError, SessionError};
pub use frames::{ClientMessage, Direction, ServerFrame};
pub use handle::{Connection, ConnectionHandle};
pub use presence::Presence;
pub use registry::{Deregistered, Registry};
pub use router::{FanOut, MessageRouter};
pub use session::Session;

use crate::{config::RelayConfig, db::UserId, gateway::Gateway, AppState};

#[derive(Clone)]
pub struct Relay {
    gateway: Arc<dyn Gateway>,
    registry: Arc<Registry>,
    presence: Presence,
    router: MessageRouter,
    outbox_capacity: usize,
}

impl Relay {
    /// The returned [`FanOut`] must be spawned for messages to reach anyone.
    pub fn new(gateway: Arc<dyn Gateway>, config: RelayConfig) -> (Relay, FanOut) {
        let registry = Arc::new(Registry::new());
        let presence = Presence::new(gateway.clone(), registry.clone());
        let (router, fan_out) = MessageRouter::new(gateway.clone(), registry.clone(), config.delivery_queue_capacity);
        let relay = Relay {
            gateway,
            registry,
            presence,
            router,
            outbox_capacity: config.outbox_capacity,
        };
        (relay, fan_out)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn session(&self, user_id: UserId) -> Session {
        Session::new(self.clone(), user_id)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::connect))
}
