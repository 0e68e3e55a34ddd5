use chrono::{DateTime, Utc};
use pairchat_types::Message;
use uuid::Uuid;

use crate::{DbPool, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: String,
    media_url: Option<String>,
    created_at: DateTime<Utc>,
    read: bool,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            content: row.content,
            media_url: row.media_url,
            created_at: row.created_at,
            read: row.read,
        }
    }
}

/// Insert a drained batch in one transaction, keyed by message id.
///
/// Re-running the same batch changes nothing except promoting `read`,
/// which only ever goes from false to true.
pub async fn upsert_messages(pool: &DbPool, messages: &[Message]) -> DbResult<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for message in messages {
        let result = sqlx::query(
            r#"
            INSERT INTO messages
                (id, conversation_id, sender_id, receiver_id, content, media_url, created_at, read)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET read = messages.read OR EXCLUDED.read
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.content)
        .bind(&message.media_url)
        .bind(message.created_at)
        .bind(message.read)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Number of stored messages in a conversation, ignoring `exclude`
pub async fn count_messages(
    pool: &DbPool,
    conversation_id: Uuid,
    exclude: &[Uuid],
) -> DbResult<u64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM messages
        WHERE conversation_id = $1
          AND NOT (id = ANY($2))
        "#,
    )
    .bind(conversation_id)
    .bind(exclude)
    .fetch_one(pool)
    .await?;

    Ok(count.max(0) as u64)
}

/// A newest-first slice of a conversation, ignoring `exclude`
pub async fn messages_newest_first(
    pool: &DbPool,
    conversation_id: Uuid,
    offset: u64,
    limit: u64,
    exclude: &[Uuid],
) -> DbResult<Vec<Message>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, conversation_id, sender_id, receiver_id, content, media_url, created_at, read
        FROM messages
        WHERE conversation_id = $1
          AND NOT (id = ANY($2))
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(conversation_id)
    .bind(exclude)
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Mark every unread message addressed to `reader` in a conversation as read
pub async fn mark_read(pool: &DbPool, conversation_id: Uuid, reader: Uuid) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET read = TRUE
        WHERE conversation_id = $1
          AND receiver_id = $2
          AND read = FALSE
        "#,
    )
    .bind(conversation_id)
    .bind(reader)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
