use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{error::DeliveryError, handle::ConnectionHandle};
use crate::db::UserId;

/// Outcome of [`Registry::deregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deregistered {
    /// The handle was the live entry and has been removed.
    Removed,
    /// Nothing was registered for the identity.
    Absent,
    /// A newer connection owns the identity; it was left in place.
    Superseded,
}

/// Who is currently reachable, one live connection per user.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<UserId, ConnectionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handle` for its user, returning the connection it replaced.
    pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let user_id = handle.user_id();
        let previous = self.entries.write().insert(user_id, handle);
        if previous.is_some() {
            debug!("u/{user_id} reconnected, previous connection superseded");
        }
        previous
    }

    /// Removes the entry for the handle's user only if it is still this handle.
    pub fn deregister(&self, handle: &ConnectionHandle) -> Deregistered {
        let user_id = handle.user_id();
        let mut entries = self.entries.write();
        match entries.get(&user_id) {
            None => Deregistered::Absent,
            Some(current) if current.id() == handle.id() => {
                entries.remove(&user_id);
                Deregistered::Removed
            }
            Some(_) => Deregistered::Superseded,
        }
    }

    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionHandle> {
        self.entries.read().get(&user_id).cloned()
    }

    /// Visits a snapshot of the live connections.
    ///
    /// A connection the visitor fails to write to is deregistered and closed;
    /// the remaining connections are still visited.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&ConnectionHandle) -> Result<(), DeliveryError>,
    {
        let snapshot: Vec<ConnectionHandle> = self.entries.read().values().cloned().collect();
        for handle in &snapshot {
            if let Err(err) = visit(handle) {
                warn!("dropping u/{}: {err}", handle.user_id());
                self.evict(handle);
            }
        }
    }

    /// Deregisters and closes a connection whose writes are failing.
    pub fn evict(&self, handle: &ConnectionHandle) {
        self.deregister(handle);
        handle.close();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
