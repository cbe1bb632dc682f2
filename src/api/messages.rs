use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{db::{Message, MessageId, UserId}, AppError, AppResult};

#[derive(Deserialize)]
pub(crate) struct ConversationQuery {
    #[serde(default)]
    current_user_id: UserId,
    #[serde(default)]
    other_user_id: UserId,
}

/// History between two users, oldest first.
#[debug_handler]
pub(crate) async fn conversation(
    Query(ConversationQuery { current_user_id, other_user_id }): Query<ConversationQuery>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Message>>> {
    if current_user_id == 0 || other_user_id == 0 {
        return Err(AppError::bad_request("invalid user ids"));
    }

    let rows: Vec<(MessageId, UserId, UserId, String, OffsetDateTime)> = sqlx::query_as(
        r#"SELECT id,sender_id,receiver_id,content,timestamp
        FROM messages
        WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
        ORDER BY id ASC"#,
    )
        .bind(current_user_id)
        .bind(other_user_id)
        .bind(other_user_id)
        .bind(current_user_id)
        .fetch_all(&db_pool)
        .await?;

    let messages = rows
        .into_iter()
        .map(|(id, sender_id, receiver_id, content, timestamp)| Message {
            id,
            sender_id,
            receiver_id,
            content,
            timestamp,
        })
        .collect();

    Ok(Json(messages))
}
