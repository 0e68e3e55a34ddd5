use pairchat_types::Profile;
use uuid::Uuid;

use crate::{DbPool, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    avatar: Option<String>,
}

/// Profile lookup for the cache-miss path of the profile directory
pub async fn get_user_profile(pool: &DbPool, user_id: Uuid) -> DbResult<Option<Profile>> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, username, avatar
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Profile {
        id: row.id,
        username: row.username,
        avatar: row.avatar,
    }))
}
