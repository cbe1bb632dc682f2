use axum::{debug_handler, extract::{Query, State, WebSocketUpgrade}, response::Response};
use futures_util::StreamExt;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::debug;

use crate::{db::UserId, gateway::GatewayError, session::USER_ID, AppError, AppResult, AppState};

use super::Relay;

#[derive(Deserialize)]
pub(crate) struct ConnectQuery {
    user_id: Option<UserId>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn connect(
    Query(ConnectQuery { user_id }): Query<ConnectQuery>,
    State(relay): State<Relay>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let user_id = match user_id {
        Some(user_id) => user_id,
        None => session.get::<UserId>(USER_ID).await?.unwrap_or(0),
    };
    if user_id <= 0 {
        return Err(AppError::bad_request("a non-zero user_id is required"));
    }

    match relay.gateway().resolve_username(user_id).await {
        Ok(username) => debug!("upgrading @{username}#{user_id}"),
        Err(GatewayError::UnknownUser(_)) => {
            return Err(AppError::not_found(format!("no user with id {user_id}")));
        }
        Err(err) => return Err(err.into()),
    }

    Ok(ws.on_upgrade(move |socket| async move {
        let (sender, receiver) = socket.split();
        // run() has already logged how the session ended
        drop(relay.session(user_id).run(receiver, sender).await);
    }))
}
