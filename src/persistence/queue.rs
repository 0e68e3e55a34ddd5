// ============================================================================
// Persistence job queue
// ============================================================================
//
// A job names one conversation whose hot cache should be drained. Jobs are
// deduplicated per conversation: while a job is pending (or being worked
// on) further enqueues are no-ops.
//
// Redis layout:
// - persist:queue              list of JSON jobs (LPUSH / RPOP, FIFO)
// - persist:job:{conversation} dedup key, SET NX EX
// - persist:dead_letter        list of JSON dead-letter records
//
// ============================================================================

use async_trait::async_trait;
use chrono::Utc;
use pairchat_config::RedisKeyPrefixes;
use pairchat_error::AppResult;
use pairchat_redis::RedisClient;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistJob {
    pub conversation_id: Uuid,
    /// Failed attempts so far
    #[serde(default)]
    pub attempt: u32,
    /// Unix ms
    pub enqueued_at: i64,
}

impl PersistJob {
    pub fn new(conversation_id: Uuid) -> Self {
        Self {
            conversation_id,
            attempt: 0,
            enqueued_at: Utc::now().timestamp_millis(),
        }
    }

    /// The same job, one failure later
    pub fn next_attempt(&self) -> Self {
        Self {
            conversation_id: self.conversation_id,
            attempt: self.attempt + 1,
            enqueued_at: Utc::now().timestamp_millis(),
        }
    }
}

/// A job that exhausted its attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterJob {
    pub job: PersistJob,
    /// Number of times processing was attempted
    pub attempts: u32,
    /// Last error message
    pub failure_reason: String,
    /// Unix ms
    pub dead_lettered_at: i64,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Returns false when a job for the conversation is already pending
    async fn enqueue(&self, conversation_id: Uuid) -> AppResult<bool>;

    /// Oldest pending job, if any. Never blocks.
    async fn next(&self) -> AppResult<Option<PersistJob>>;

    /// Put a failed job back; its dedup claim is kept
    async fn retry(&self, job: PersistJob) -> AppResult<()>;

    /// Queue a fresh job even if a claim is still held, taking the claim
    /// over. For jobs whose worker died after popping them.
    async fn requeue(&self, conversation_id: Uuid) -> AppResult<()>;

    /// Release the dedup claim of a finished job
    async fn complete(&self, job: &PersistJob) -> AppResult<()>;

    /// Park a job for manual inspection and release its dedup claim
    async fn dead_letter(&self, record: DeadLetterJob) -> AppResult<()>;
}

pub struct RedisJobQueue {
    redis: RedisClient,
    prefixes: RedisKeyPrefixes,
    dedup_ttl_secs: u64,
}

impl RedisJobQueue {
    pub fn new(redis: RedisClient, prefixes: RedisKeyPrefixes, dedup_ttl_secs: u64) -> Self {
        Self {
            redis,
            prefixes,
            dedup_ttl_secs,
        }
    }

    fn dedup_key(&self, conversation_id: Uuid) -> String {
        format!("{}{}", self.prefixes.persist_job, conversation_id)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, conversation_id: Uuid) -> AppResult<bool> {
        let mut redis = self.redis.clone();
        let claimed = redis
            .set_nx_ex(&self.dedup_key(conversation_id), "1", self.dedup_ttl_secs)
            .await?;
        if !claimed {
            return Ok(false);
        }

        let payload = serde_json::to_string(&PersistJob::new(conversation_id))?;
        if let Err(e) = redis.lpush(&self.prefixes.persist_queue, payload).await {
            // Release the claim so the next send can enqueue again
            let _ = redis.del(self.dedup_key(conversation_id)).await;
            return Err(e.into());
        }
        Ok(true)
    }

    async fn next(&self) -> AppResult<Option<PersistJob>> {
        let mut redis = self.redis.clone();
        let Some(raw) = redis.rpop(&self.prefixes.persist_queue).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<PersistJob>(&raw) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                tracing::error!(
                    target: "dlq",
                    error = %e,
                    payload = %raw,
                    "Dropping unreadable persistence job"
                );
                Ok(None)
            }
        }
    }

    async fn retry(&self, job: PersistJob) -> AppResult<()> {
        let mut redis = self.redis.clone();
        let payload = serde_json::to_string(&job)?;
        redis.lpush(&self.prefixes.persist_queue, payload).await?;
        redis
            .expire(
                &self.dedup_key(job.conversation_id),
                self.dedup_ttl_secs as i64,
            )
            .await?;
        Ok(())
    }

    async fn requeue(&self, conversation_id: Uuid) -> AppResult<()> {
        let payload = serde_json::to_string(&PersistJob::new(conversation_id))?;
        let mut pipeline = pairchat_redis::pipe();
        pipeline
            .atomic()
            .set_ex(self.dedup_key(conversation_id), "1", self.dedup_ttl_secs)
            .ignore()
            .lpush(&self.prefixes.persist_queue, payload)
            .ignore();

        let mut redis = self.redis.clone();
        let () = redis.run_pipeline(&pipeline).await?;
        Ok(())
    }

    async fn complete(&self, job: &PersistJob) -> AppResult<()> {
        let mut redis = self.redis.clone();
        redis.del(self.dedup_key(job.conversation_id)).await?;
        Ok(())
    }

    async fn dead_letter(&self, record: DeadLetterJob) -> AppResult<()> {
        let mut redis = self.redis.clone();
        let payload = serde_json::to_string(&record)?;
        redis.lpush(&self.prefixes.dead_letter, payload).await?;
        redis.del(self.dedup_key(record.job.conversation_id)).await?;
        Ok(())
    }
}
