use std::{cmp::Reverse, collections::HashMap};

use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{db::{MessageId, User, UserId}, AppResult};

#[derive(Deserialize)]
pub(crate) struct UsersQuery {
    #[serde(default)]
    current_user_id: UserId,
}

/// Everyone but the caller: recent conversations first, then alphabetical.
#[debug_handler]
pub(crate) async fn list_users(
    Query(UsersQuery { current_user_id }): Query<UsersQuery>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<User>>> {
    let rows: Vec<(UserId, String, bool)> = sqlx::query_as("SELECT id,username,online FROM users WHERE id != ?")
        .bind(current_user_id)
        .fetch_all(&db_pool)
        .await?;

    // ids grow with every insert, so the highest id is the latest message
    let latest: HashMap<UserId, MessageId> = sqlx::query_as::<_, (UserId, MessageId)>(
        r#"SELECT CASE WHEN sender_id = ? THEN receiver_id ELSE sender_id END AS other_id, MAX(id)
        FROM messages
        WHERE sender_id = ? OR receiver_id = ?
        GROUP BY other_id"#,
    )
        .bind(current_user_id)
        .bind(current_user_id)
        .bind(current_user_id)
        .fetch_all(&db_pool)
        .await?
        .into_iter()
        .collect();

    let mut users: Vec<User> = rows
        .into_iter()
        .map(|(id, username, online)| User { id, username, online })
        .collect();
    users.sort_by_cached_key(|user| {
        (Reverse(latest.get(&user.id).copied()), user.username.to_lowercase())
    });

    Ok(Json(users))
}
