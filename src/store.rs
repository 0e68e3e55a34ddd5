// ============================================================================
// Durable Message Store
// ============================================================================
//
// The system of record for conversations and messages. The router and the
// history reader only see the `MessageStore` trait; Postgres is the
// production implementation.
//
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pairchat_db::{ConversationWithUnread, DbPool};
use pairchat_error::AppResult;
use pairchat_types::{Conversation, Message};
use uuid::Uuid;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Idempotent: (A,B) and (B,A) resolve to the same conversation
    async fn find_or_create_conversation(&self, user_a: Uuid, user_b: Uuid)
        -> AppResult<Conversation>;

    async fn find_conversation_by_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Option<Conversation>>;

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>>;

    /// New preview and activity time; `updated_at` never moves backwards
    async fn touch_conversation(
        &self,
        conversation_id: Uuid,
        last_message: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Write a drained batch in one transaction. Replaying a batch is a no-op.
    async fn upsert_messages(&self, messages: &[Message]) -> AppResult<u64>;

    async fn count_messages(&self, conversation_id: Uuid, exclude: &[Uuid]) -> AppResult<u64>;

    async fn messages_newest_first(
        &self,
        conversation_id: Uuid,
        offset: u64,
        limit: u64,
        exclude: &[Uuid],
    ) -> AppResult<Vec<Message>>;

    async fn mark_read(&self, conversation_id: Uuid, reader: Uuid) -> AppResult<u64>;

    /// A user's conversations, most recently active first, with the total
    async fn conversation_page(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u32,
    ) -> AppResult<(Vec<ConversationWithUnread>, u64)>;

    async fn count_conversations(&self, user_id: Uuid) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct PostgresMessageStore {
    pool: DbPool,
}

impl PostgresMessageStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn find_or_create_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Conversation> {
        Ok(pairchat_db::find_or_create_conversation(&self.pool, user_a, user_b).await?)
    }

    async fn find_conversation_by_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Option<Conversation>> {
        Ok(pairchat_db::find_conversation_by_pair(&self.pool, user_a, user_b).await?)
    }

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(pairchat_db::get_conversation(&self.pool, conversation_id).await?)
    }

    async fn touch_conversation(
        &self,
        conversation_id: Uuid,
        last_message: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let updated =
            pairchat_db::touch_conversation(&self.pool, conversation_id, last_message, at).await?;
        if !updated {
            tracing::warn!(
                conversation_id = %conversation_id,
                "Activity recorded for a conversation the store does not know"
            );
        }
        Ok(())
    }

    async fn upsert_messages(&self, messages: &[Message]) -> AppResult<u64> {
        if messages.is_empty() {
            return Ok(0);
        }
        Ok(pairchat_db::upsert_messages(&self.pool, messages).await?)
    }

    async fn count_messages(&self, conversation_id: Uuid, exclude: &[Uuid]) -> AppResult<u64> {
        Ok(pairchat_db::count_messages(&self.pool, conversation_id, exclude).await?)
    }

    async fn messages_newest_first(
        &self,
        conversation_id: Uuid,
        offset: u64,
        limit: u64,
        exclude: &[Uuid],
    ) -> AppResult<Vec<Message>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(
            pairchat_db::messages_newest_first(&self.pool, conversation_id, offset, limit, exclude)
                .await?,
        )
    }

    async fn mark_read(&self, conversation_id: Uuid, reader: Uuid) -> AppResult<u64> {
        Ok(pairchat_db::mark_read(&self.pool, conversation_id, reader).await?)
    }

    async fn conversation_page(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u32,
    ) -> AppResult<(Vec<ConversationWithUnread>, u64)> {
        Ok(pairchat_db::conversation_page(&self.pool, user_id, offset, limit).await?)
    }

    async fn count_conversations(&self, user_id: Uuid) -> AppResult<u64> {
        Ok(pairchat_db::count_conversations(&self.pool, user_id).await?)
    }
}
