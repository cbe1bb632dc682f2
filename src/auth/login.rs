use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{db::UserId, session::USER_ID, AppError, AppResult, AppState};

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LoginResponse {
    pub id: UserId,
    pub username: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(LoginRequest { username, password }): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let denied = || AppError::unauthorized("invalid username or password");

    let Some((id, username, hashed)): Option<(UserId, String, String)> =
        sqlx::query_as("SELECT id,username,password FROM users WHERE username=?")
            .bind(&username)
            .fetch_optional(&db_pool)
            .await?
    else {
        return Err(denied());
    };

    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed)).await??;
    if !matches {
        return Err(denied());
    }

    session.insert(USER_ID, id).await?;
    info!("welcome @{username}#{id}");

    Ok(Json(LoginResponse { id, username }))
}
