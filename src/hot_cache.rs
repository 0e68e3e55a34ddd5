// ============================================================================
// Hot Message Cache
// ============================================================================
//
// Per-conversation zset of serialized messages scored by creation time (ms).
// Holds only messages the persistence worker has not drained yet.
//
// Keys:
// - chat:messages:{conversation_id}  live cache
// - chat:staging:{conversation_id}   frozen copy of the batch being drained
// - chat:read:{conversation_id}      reader -> last read ms, for messages read while hot
//
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pairchat_config::RedisKeyPrefixes;
use pairchat_error::{AppError, AppResult};
use pairchat_redis::RedisClient;
use pairchat_types::Message;
use std::collections::HashMap;
use uuid::Uuid;

/// One member of a staging copy, kept raw so it can be removed verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct StagedEntry {
    pub member: String,
    pub score: f64,
}

/// The frozen set of messages a drain commits
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedBatch {
    /// True when an earlier, interrupted drain left this staging copy behind
    pub resumed: bool,
    pub entries: Vec<StagedEntry>,
}

impl StagedBatch {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
pub trait HotCache: Send + Sync {
    /// Append a message and return the cache size after the write.
    /// A key holding the wrong data type is discarded first.
    async fn append(&self, message: &Message) -> AppResult<u64>;

    async fn len(&self, conversation_id: Uuid) -> AppResult<u64>;

    /// Every cached message, newest first
    async fn snapshot(&self, conversation_id: Uuid) -> AppResult<Vec<Message>>;

    /// Resume the existing staging copy, or freeze the live cache into a new one
    async fn stage(&self, conversation_id: Uuid) -> AppResult<StagedBatch>;

    /// Remove exactly the staged members from the live cache and drop the
    /// staging copy, atomically
    async fn clear_staged(&self, conversation_id: Uuid, batch: &StagedBatch) -> AppResult<()>;

    /// Conversations that have a staging copy left behind
    async fn staged_conversations(&self) -> AppResult<Vec<Uuid>>;

    async fn mark_read_through(
        &self,
        conversation_id: Uuid,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// reader id -> last read time in ms
    async fn read_markers(&self, conversation_id: Uuid) -> AppResult<HashMap<Uuid, i64>>;
}

/// Decode cached members, skipping (and logging) anything unreadable
pub(crate) fn decode_members<'a>(
    conversation_id: Uuid,
    members: impl IntoIterator<Item = &'a str>,
) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut dropped = 0usize;
    for member in members {
        match serde_json::from_str::<Message>(member) {
            Ok(message) => messages.push(message),
            Err(e) => {
                dropped += 1;
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    member_len = member.len(),
                    "Skipping unreadable hot cache member"
                );
            }
        }
    }
    if dropped > 0 {
        tracing::error!(
            conversation_id = %conversation_id,
            dropped_messages = dropped,
            "Hot cache contained unreadable members"
        );
    }
    messages
}

pub struct RedisHotCache {
    redis: RedisClient,
    prefixes: RedisKeyPrefixes,
    read_marker_ttl_secs: i64,
}

impl RedisHotCache {
    pub fn new(redis: RedisClient, prefixes: RedisKeyPrefixes, read_marker_ttl_secs: u64) -> Self {
        Self {
            redis,
            prefixes,
            read_marker_ttl_secs: read_marker_ttl_secs as i64,
        }
    }

    fn hot_key(&self, conversation_id: Uuid) -> String {
        format!("{}{}", self.prefixes.hot_messages, conversation_id)
    }

    fn staging_key(&self, conversation_id: Uuid) -> String {
        format!("{}{}", self.prefixes.staging, conversation_id)
    }

    fn read_key(&self, conversation_id: Uuid) -> String {
        format!("{}{}", self.prefixes.read_marker, conversation_id)
    }

    /// Delete `key` if it holds anything but a zset. Returns true when the
    /// key is now a zset or absent.
    async fn ensure_zset(&self, redis: &mut RedisClient, key: &str) -> AppResult<bool> {
        let found = redis.key_type(key).await?;
        if found == "zset" || found == "none" {
            return Ok(found == "zset");
        }
        let err = AppError::corrupted_cache(key, &found);
        tracing::warn!(error = %err, event = "hot_cache_self_heal", "Discarding corrupted cache key");
        redis.del(key).await?;
        Ok(false)
    }

    async fn read_staging(&self, redis: &mut RedisClient, key: &str) -> AppResult<Vec<StagedEntry>> {
        let entries = redis.zrange_withscores(key, 0, -1).await?;
        Ok(entries
            .into_iter()
            .map(|(member, score)| StagedEntry { member, score })
            .collect())
    }
}

#[async_trait]
impl HotCache for RedisHotCache {
    async fn append(&self, message: &Message) -> AppResult<u64> {
        let key = self.hot_key(message.conversation_id);
        let member = serde_json::to_string(message)?;
        let mut redis = self.redis.clone();

        self.ensure_zset(&mut redis, &key).await?;

        let mut pipeline = pairchat_redis::pipe();
        pipeline
            .atomic()
            .zadd(&key, &member, message.score())
            .ignore()
            .zcard(&key);
        let (size,): (u64,) = redis.run_pipeline(&pipeline).await?;
        Ok(size)
    }

    async fn len(&self, conversation_id: Uuid) -> AppResult<u64> {
        let key = self.hot_key(conversation_id);
        let mut redis = self.redis.clone();
        if !self.ensure_zset(&mut redis, &key).await? {
            return Ok(0);
        }
        Ok(redis.zcard(&key).await?)
    }

    async fn snapshot(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let key = self.hot_key(conversation_id);
        let mut redis = self.redis.clone();
        if !self.ensure_zset(&mut redis, &key).await? {
            return Ok(Vec::new());
        }
        let members = redis.zrevrange(&key, 0, -1).await?;
        Ok(decode_members(
            conversation_id,
            members.iter().map(String::as_str),
        ))
    }

    async fn stage(&self, conversation_id: Uuid) -> AppResult<StagedBatch> {
        let hot = self.hot_key(conversation_id);
        let staging = self.staging_key(conversation_id);
        let mut redis = self.redis.clone();

        if self.ensure_zset(&mut redis, &staging).await? {
            let entries = self.read_staging(&mut redis, &staging).await?;
            if !entries.is_empty() {
                return Ok(StagedBatch {
                    resumed: true,
                    entries,
                });
            }
        }

        if !self.ensure_zset(&mut redis, &hot).await? {
            return Ok(StagedBatch::default());
        }
        let copied = redis.zcopy(&staging, &hot).await?;
        if copied == 0 {
            return Ok(StagedBatch::default());
        }
        let entries = self.read_staging(&mut redis, &staging).await?;
        Ok(StagedBatch {
            resumed: false,
            entries,
        })
    }

    async fn clear_staged(&self, conversation_id: Uuid, batch: &StagedBatch) -> AppResult<()> {
        let hot = self.hot_key(conversation_id);
        let staging = self.staging_key(conversation_id);
        let members: Vec<&str> = batch.entries.iter().map(|e| e.member.as_str()).collect();

        let mut pipeline = pairchat_redis::pipe();
        pipeline.atomic();
        if !members.is_empty() {
            pipeline.zrem(&hot, members).ignore();
        }
        pipeline.del(&staging).ignore();

        let mut redis = self.redis.clone();
        let () = redis.run_pipeline(&pipeline).await?;
        Ok(())
    }

    async fn staged_conversations(&self) -> AppResult<Vec<Uuid>> {
        let mut redis = self.redis.clone();
        let pattern = RedisKeyPrefixes::pattern(&self.prefixes.staging);
        let keys = redis.scan_match(&pattern).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&self.prefixes.staging))
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect())
    }

    async fn mark_read_through(
        &self,
        conversation_id: Uuid,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let key = self.read_key(conversation_id);
        let mut redis = self.redis.clone();
        redis
            .hset(&key, &reader.to_string(), &at.timestamp_millis().to_string())
            .await?;
        redis.expire(&key, self.read_marker_ttl_secs).await?;
        Ok(())
    }

    async fn read_markers(&self, conversation_id: Uuid) -> AppResult<HashMap<Uuid, i64>> {
        let key = self.read_key(conversation_id);
        let mut redis = self.redis.clone();
        let raw = redis.hgetall(&key).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(reader, at)| Some((Uuid::parse_str(&reader).ok()?, at.parse().ok()?)))
            .collect())
    }
}
