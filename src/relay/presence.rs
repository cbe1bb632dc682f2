use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{frames::ServerFrame, registry::Registry};
use crate::{db::UserId, gateway::Gateway};

type Turn = Arc<tokio::sync::Mutex<()>>;

/// Fans online/offline changes out to every live connection.
///
/// Announcements for one user run one at a time, so a reconnect's online
/// status always lands after the offline status of the connection it replaced.
#[derive(Clone)]
pub struct Presence {
    gateway: Arc<dyn Gateway>,
    registry: Arc<Registry>,
    turns: Arc<Mutex<HashMap<UserId, Turn>>>,
}

impl Presence {
    pub fn new(gateway: Arc<dyn Gateway>, registry: Arc<Registry>) -> Self {
        Self { gateway, registry, turns: Arc::default() }
    }

    /// Best effort: a failed flag write is logged and the broadcast still goes
    /// out; an unresolvable name drops the announcement. Going offline is
    /// skipped while the user still has a registered connection.
    pub async fn announce(&self, user_id: UserId, online: bool) {
        let turn = self.turn(user_id);
        {
            let _held = turn.lock().await;
            if !online && self.registry.lookup(user_id).is_some() {
                debug!("u/{user_id} reconnected, not going offline");
            } else {
                self.publish(user_id, online).await;
            }
        }
        self.release(user_id, turn);
    }

    async fn publish(&self, user_id: UserId, online: bool) {
        if let Err(err) = self.gateway.set_online(user_id, online).await {
            warn!("could not record u/{user_id} online={online}: {err}");
        }

        let username = match self.gateway.resolve_username(user_id).await {
            Ok(username) => username,
            Err(err) => {
                warn!("dropping presence for u/{user_id}: {err}");
                return;
            }
        };

        debug!("@{username} online={online}");
        let frame = ServerFrame::UserStatus { user_id, username, online };
        self.registry.for_each(|handle| handle.deliver(frame.clone()));
    }

    fn turn(&self, user_id: UserId) -> Turn {
        self.turns.lock().entry(user_id).or_default().clone()
    }

    // Turns are only cloned under the map lock, so a count of one means
    // nobody else is waiting on it.
    fn release(&self, user_id: UserId, turn: Turn) {
        let mut turns = self.turns.lock();
        drop(turn);
        if turns.get(&user_id).is_some_and(|turn| Arc::strong_count(turn) == 1) {
            turns.remove(&user_id);
        }
    }
}
