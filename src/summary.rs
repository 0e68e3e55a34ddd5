// ============================================================================
// Conversation Summary Cache
// ============================================================================
//
// Per-user "recent conversations" lists plus per-conversation details and
// unseen counters, kept in Redis so the conversation list never touches
// Postgres on the hot path.
//
// Keys:
// - conversation:list:{user_id}          zset conversation id -> last activity ms,
//                                        capped at the N most recent
// - conversation:details:{conversation}  hash lastMessage, timestamp, user1Id, user2Id
// - conversation:unseen:{conversation}   hash user id -> unseen count
//
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pairchat_config::RedisKeyPrefixes;
use pairchat_error::{AppError, AppResult};
use pairchat_redis::RedisClient;
use pairchat_types::Conversation;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::MessageStore;

const FIELD_LAST_MESSAGE: &str = "lastMessage";
const FIELD_TIMESTAMP: &str = "timestamp";
const FIELD_USER1: &str = "user1Id";
const FIELD_USER2: &str = "user2Id";

/// New activity in a conversation, as recorded after each send
#[derive(Debug, Clone)]
pub struct ActivityUpdate {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub preview: String,
    pub at: DateTime<Utc>,
}

/// One cached row of a conversation list, before profile lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CachedConversation {
    pub conversation_id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub last_message: String,
    pub last_activity: DateTime<Utc>,
    pub unseen: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedConversationPage {
    pub entries: Vec<CachedConversation>,
    /// Size of the user's cached list
    pub total: u64,
    /// The list is at its cap; older conversations may only exist in the
    /// durable store
    pub at_capacity: bool,
}

#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// Bump the conversation to the top of both participants' lists and
    /// store the new preview. Lists are trimmed to the configured cap.
    async fn record_activity(&self, update: &ActivityUpdate) -> AppResult<()>;

    /// A page of the user's cached list, most recent first. `None` when the
    /// cache has nothing for that page and the caller should fall back to
    /// the durable store.
    async fn conversation_page(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> AppResult<Option<CachedConversationPage>>;

    async fn participants(&self, conversation_id: Uuid) -> AppResult<Option<(Uuid, Uuid)>>;

    /// Cache the participant pair of a conversation without touching its
    /// preview or list position
    async fn remember_participants(&self, conversation: &Conversation) -> AppResult<()>;

    async fn increment_unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<i64>;

    async fn unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<i64>;

    async fn clear_unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()>;
}

/// Participants of a conversation: details hash first, durable store second.
///
/// A store hit is written back to the cache. Unknown conversations are
/// `NotFound`.
pub async fn conversation_participants(
    summaries: &dyn SummaryCache,
    store: &dyn MessageStore,
    conversation_id: Uuid,
) -> AppResult<(Uuid, Uuid)> {
    if let Some(pair) = summaries.participants(conversation_id).await? {
        return Ok(pair);
    }

    let conversation = store
        .conversation(conversation_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("conversation {}", conversation_id)))?;

    if let Err(e) = summaries.remember_participants(&conversation).await {
        tracing::warn!(
            conversation_id = %conversation_id,
            error = %e,
            "Failed to cache conversation participants"
        );
    }
    Ok((conversation.user_a, conversation.user_b))
}

/// The participant other than `user_id`, or `Forbidden` for outsiders
pub async fn peer_of(
    summaries: &dyn SummaryCache,
    store: &dyn MessageStore,
    conversation_id: Uuid,
    user_id: Uuid,
) -> AppResult<Uuid> {
    let (user_a, user_b) = conversation_participants(summaries, store, conversation_id).await?;
    pairchat_types::participant_peer(user_a, user_b, user_id)
        .ok_or_else(|| AppError::forbidden("not a participant of this conversation"))
}

pub struct RedisSummaryCache {
    redis: RedisClient,
    prefixes: RedisKeyPrefixes,
    max_conversations: isize,
}

impl RedisSummaryCache {
    pub fn new(redis: RedisClient, prefixes: RedisKeyPrefixes, max_conversations: isize) -> Self {
        Self {
            redis,
            prefixes,
            max_conversations: max_conversations.max(1),
        }
    }

    fn list_key(&self, user_id: Uuid) -> String {
        format!("{}{}", self.prefixes.conversation_list, user_id)
    }

    fn details_key(&self, conversation_id: Uuid) -> String {
        format!("{}{}", self.prefixes.conversation_details, conversation_id)
    }

    fn unseen_key(&self, conversation_id: Uuid) -> String {
        format!("{}{}", self.prefixes.unseen, conversation_id)
    }
}

fn parse_details(
    conversation_id: Uuid,
    details: &HashMap<String, String>,
) -> Option<(Uuid, Uuid, String, DateTime<Utc>)> {
    let user_a = details.get(FIELD_USER1)?.parse().ok()?;
    let user_b = details.get(FIELD_USER2)?.parse().ok()?;
    let last_message = details.get(FIELD_LAST_MESSAGE).cloned().unwrap_or_default();
    let at = details
        .get(FIELD_TIMESTAMP)
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis);

    match at {
        Some(at) => Some((user_a, user_b, last_message, at)),
        None => {
            tracing::debug!(
                conversation_id = %conversation_id,
                "Conversation details have no activity timestamp"
            );
            None
        }
    }
}

#[async_trait]
impl SummaryCache for RedisSummaryCache {
    async fn record_activity(&self, update: &ActivityUpdate) -> AppResult<()> {
        let member = update.conversation_id.to_string();
        let score = update.at.timestamp_millis() as f64;
        let sender_list = self.list_key(update.sender_id);
        let receiver_list = self.list_key(update.receiver_id);
        let trim_stop = -self.max_conversations - 1;

        let mut pipeline = pairchat_redis::pipe();
        pipeline
            .atomic()
            .zadd(&sender_list, &member, score)
            .ignore()
            .zadd(&receiver_list, &member, score)
            .ignore()
            .hset_multiple(
                self.details_key(update.conversation_id),
                &[
                    (FIELD_LAST_MESSAGE, update.preview.clone()),
                    (FIELD_TIMESTAMP, update.at.timestamp_millis().to_string()),
                    (FIELD_USER1, update.sender_id.to_string()),
                    (FIELD_USER2, update.receiver_id.to_string()),
                ],
            )
            .ignore()
            .zremrangebyrank(&sender_list, 0, trim_stop)
            .ignore()
            .zremrangebyrank(&receiver_list, 0, trim_stop)
            .ignore();

        let mut redis = self.redis.clone();
        let () = redis.run_pipeline(&pipeline).await?;
        Ok(())
    }

    async fn conversation_page(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> AppResult<Option<CachedConversationPage>> {
        if limit == 0 {
            return Err(AppError::validation("limit must be greater than 0"));
        }
        let list = self.list_key(user_id);
        let start = (page.max(1) as isize - 1) * limit as isize;
        let stop = start + limit as isize - 1;

        let mut redis = self.redis.clone();
        let ids = redis.zrevrange(&list, start, stop).await?;
        if ids.is_empty() {
            return Ok(None);
        }
        let total = redis.zcard(&list).await?;

        let mut entries = Vec::with_capacity(ids.len());
        for raw in ids {
            let Ok(conversation_id) = Uuid::parse_str(&raw) else {
                tracing::warn!(member = %raw, "Skipping malformed conversation list member");
                continue;
            };
            let details = redis.hgetall(&self.details_key(conversation_id)).await?;
            let Some((user_a, user_b, last_message, last_activity)) =
                parse_details(conversation_id, &details)
            else {
                continue;
            };
            let unseen: Option<i64> = redis
                .hget(&self.unseen_key(conversation_id), &user_id.to_string())
                .await?;

            entries.push(CachedConversation {
                conversation_id,
                user_a,
                user_b,
                last_message,
                last_activity,
                unseen: unseen.unwrap_or(0).max(0),
            });
        }

        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(CachedConversationPage {
            entries,
            total,
            at_capacity: total >= self.max_conversations as u64,
        }))
    }

    async fn participants(&self, conversation_id: Uuid) -> AppResult<Option<(Uuid, Uuid)>> {
        let mut redis = self.redis.clone();
        let details = redis.hgetall(&self.details_key(conversation_id)).await?;
        let user_a = details.get(FIELD_USER1).and_then(|v| v.parse().ok());
        let user_b = details.get(FIELD_USER2).and_then(|v| v.parse().ok());
        Ok(user_a.zip(user_b))
    }

    async fn remember_participants(&self, conversation: &Conversation) -> AppResult<()> {
        let mut redis = self.redis.clone();
        redis
            .hset_multiple(
                &self.details_key(conversation.id),
                &[
                    (FIELD_USER1, conversation.user_a.to_string()),
                    (FIELD_USER2, conversation.user_b.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn increment_unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let mut redis = self.redis.clone();
        Ok(redis
            .hincr(&self.unseen_key(conversation_id), &user_id.to_string(), 1)
            .await?)
    }

    async fn unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let mut redis = self.redis.clone();
        let count: Option<i64> = redis
            .hget(&self.unseen_key(conversation_id), &user_id.to_string())
            .await?;
        Ok(count.unwrap_or(0))
    }

    async fn clear_unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut redis = self.redis.clone();
        redis
            .hset(&self.unseen_key(conversation_id), &user_id.to_string(), "0")
            .await?;
        Ok(())
    }
}
