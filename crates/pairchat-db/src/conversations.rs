use chrono::{DateTime, Utc};
use pairchat_types::{ordered_pair, Conversation, ConversationStatus};
use uuid::Uuid;

use crate::{DbPool, DbResult};

const CONVERSATION_COLUMNS: &str =
    "id, user_a, user_b, last_message, status, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    user_a: Uuid,
    user_b: Uuid,
    last_message: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            user_a: row.user_a,
            user_b: row.user_b,
            last_message: row.last_message,
            // The CHECK constraint only admits known values
            status: row.status.parse().unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Conversation row plus the number of messages the listing user has not read
#[derive(Debug, Clone)]
pub struct ConversationWithUnread {
    pub conversation: Conversation,
    pub unread: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ConversationUnreadRow {
    #[sqlx(flatten)]
    row: ConversationRow,
    unread: i64,
}

/// Idempotent find-or-create keyed on the unordered pair.
///
/// The pair is stored sorted and guarded by a unique constraint, so (A,B)
/// and (B,A) always land on the same row even under concurrent calls.
pub async fn find_or_create_conversation(
    pool: &DbPool,
    user_a: Uuid,
    user_b: Uuid,
) -> DbResult<Conversation> {
    let (low, high) = ordered_pair(user_a, user_b);
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        r#"
        INSERT INTO conversations (id, user_a, user_b, status)
        VALUES ($1, $2, $3, 'ACTIVE')
        ON CONFLICT (user_a, user_b) DO UPDATE SET user_a = EXCLUDED.user_a
        RETURNING {CONVERSATION_COLUMNS}
        "#
    ))
    .bind(Uuid::now_v7())
    .bind(low)
    .bind(high)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

pub async fn find_conversation_by_pair(
    pool: &DbPool,
    user_a: Uuid,
    user_b: Uuid,
) -> DbResult<Option<Conversation>> {
    let (low, high) = ordered_pair(user_a, user_b);
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE user_a = $1 AND user_b = $2"
    ))
    .bind(low)
    .bind(high)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

pub async fn get_conversation(pool: &DbPool, id: Uuid) -> DbResult<Option<Conversation>> {
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// Record activity: new preview, bumped `updated_at`, status back to ACTIVE.
///
/// `updated_at` never moves backwards, so out-of-order background updates
/// cannot make a conversation look older than it is.
pub async fn touch_conversation(
    pool: &DbPool,
    id: Uuid,
    last_message: &str,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET last_message = CASE WHEN updated_at <= $3 THEN $2 ELSE last_message END,
            updated_at = GREATEST(updated_at, $3),
            status = $4
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(last_message)
    .bind(at)
    .bind(ConversationStatus::Active.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// ACTIVE conversations of a user, most recently updated first
pub async fn conversation_page(
    pool: &DbPool,
    user_id: Uuid,
    offset: u64,
    limit: u32,
) -> DbResult<(Vec<ConversationWithUnread>, u64)> {
    let rows = sqlx::query_as::<_, ConversationUnreadRow>(
        r#"
        SELECT c.id, c.user_a, c.user_b, c.last_message, c.status, c.created_at, c.updated_at,
               (
                   SELECT COUNT(*)
                   FROM messages m
                   WHERE m.conversation_id = c.id
                     AND m.receiver_id = $1
                     AND m.read = FALSE
               ) AS unread
        FROM conversations c
        WHERE (c.user_a = $1 OR c.user_b = $1)
          AND c.status = 'ACTIVE'
        ORDER BY c.updated_at DESC, c.id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(pool)
    .await?;

    let total = count_conversations(pool, user_id).await?;

    let page = rows
        .into_iter()
        .map(|row| ConversationWithUnread {
            conversation: row.row.into(),
            unread: row.unread,
        })
        .collect();

    Ok((page, total))
}

/// Number of ACTIVE conversations of a user
pub async fn count_conversations(pool: &DbPool, user_id: Uuid) -> DbResult<u64> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM conversations
        WHERE (user_a = $1 OR user_b = $1)
          AND status = 'ACTIVE'
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(total.max(0) as u64)
}
