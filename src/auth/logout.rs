use axum::{debug_handler, extract::Query, http::StatusCode, response::{IntoResponse, Redirect, Response}};
use serde::Deserialize;
use tower_sessions::Session;

use crate::AppResult;

#[derive(Deserialize)]
pub(crate) struct LogoutQuery {
    pub(crate) return_url: Option<String>,
}

#[debug_handler]
pub(crate) async fn logout(
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    session: Session
) -> AppResult<Response> {
    session.flush().await?;
    Ok(match return_url {
        Some(return_url) => Redirect::to(&return_url).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
