use std::fmt::Display;

use axum::extract::ws::Message as WsMessage;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    Relay,
    error::SessionError,
    frames::{ClientMessage, ServerFrame},
    handle::{Connection, ConnectionHandle},
    registry::Deregistered,
};
use crate::db::UserId;

/// One physical connection for one user, from registration until close.
pub struct Session {
    relay: Relay,
    user_id: UserId,
}

enum Inbound {
    Message(ClientMessage),
    Ignored,
    Close,
}

impl Session {
    pub(crate) fn new(relay: Relay, user_id: UserId) -> Self {
        Self { relay, user_id }
    }

    /// Drives the connection to completion. Inbound frames are read from
    /// `reader`; outbound frames are written to `writer` by a separate task.
    pub async fn run<R, E, W>(self, mut reader: R, writer: W) -> Result<(), SessionError>
    where
        R: Stream<Item = Result<WsMessage, E>> + Unpin,
        E: Display,
        W: Sink<WsMessage> + Unpin + Send + 'static,
        W::Error: Display,
    {
        let Session { relay, user_id } = self;
        let (handle, outbox) = Connection::open(user_id, relay.outbox_capacity);

        if let Some(previous) = relay.registry.register(handle.clone()) {
            previous.close();
        }
        info!("u/{user_id} connected ({})", handle.id());
        relay.presence.announce(user_id, true).await;

        let mut writer_task = tokio::spawn(pump(handle.clone(), outbox, writer));

        let result = loop {
            let next = tokio::select! {
                next = reader.next() => next,
                _ = handle.closed() => break Ok(()),
            };

            let frame = match next {
                None => break Ok(()),
                Some(Err(err)) => break Err(SessionError::Transport(err.to_string())),
                Some(Ok(frame)) => frame,
            };

            match decode(frame) {
                Ok(Inbound::Message(msg)) => forward(&relay, user_id, msg).await,
                Ok(Inbound::Ignored) => {}
                Ok(Inbound::Close) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        handle.close();
        match relay.registry.deregister(&handle) {
            Deregistered::Superseded => debug!("u/{user_id} still connected elsewhere"),
            Deregistered::Removed | Deregistered::Absent => relay.presence.announce(user_id, false).await,
        }
        if tokio::time::timeout(std::time::Duration::from_secs(5), &mut writer_task).await.is_err() {
            writer_task.abort();
        }

        match &result {
            Ok(()) => info!("u/{user_id} disconnected ({})", handle.id()),
            Err(err) => warn!("u/{user_id} dropped ({}): {err}", handle.id()),
        }
        result
    }
}

fn decode(frame: WsMessage) -> Result<Inbound, SessionError> {
    let msg = match frame {
        WsMessage::Text(text) => ClientMessage::decode(text.as_str().as_bytes())?,
        WsMessage::Binary(bytes) => ClientMessage::decode(&bytes)?,
        WsMessage::Ping(_) | WsMessage::Pong(_) => return Ok(Inbound::Ignored),
        WsMessage::Close(_) => return Ok(Inbound::Close),
    };
    Ok(Inbound::Message(msg))
}

async fn forward(relay: &Relay, user_id: UserId, msg: ClientMessage) {
    if msg.sender_id != user_id {
        warn!("u/{user_id} tried to send as u/{}, dropped", msg.sender_id);
        return;
    }

    match relay.router.route(msg.sender_id, msg.receiver_id, &msg.content).await {
        Ok(message) => debug!("#{} u/{} -> u/{}", message.id, message.sender_id, message.receiver_id),
        Err(err) => warn!("u/{user_id} message not routed: {err}"),
    }
}

/// Writes queued frames to the socket until the connection closes or a write fails.
async fn pump<W>(handle: ConnectionHandle, mut outbox: mpsc::Receiver<ServerFrame>, mut writer: W)
where
    W: Sink<WsMessage> + Unpin,
    W::Error: Display,
{
    loop {
        let frame = tokio::select! {
            frame = outbox.recv() => frame,
            _ = handle.closed() => None,
        };
        let Some(frame) = frame else {
            break;
        };

        let text = match frame.encode() {
            Ok(text) => text,
            Err(err) => {
                warn!("could not encode frame for u/{}: {err}", handle.user_id());
                continue;
            }
        };
        if let Err(err) = writer.send(WsMessage::Text(text.into())).await {
            debug!("write to u/{} failed: {err}", handle.user_id());
            break;
        }
    }

    handle.close();
    let _ = writer.close().await;
}
