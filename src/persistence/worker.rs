// ============================================================================
// Persistence Worker
// ============================================================================
//
// Drains hot caches into the durable store. One drain:
//
// 1. Freeze the hot cache into a staging copy (or resume a staging copy an
//    interrupted drain left behind)
// 2. Apply read markers recorded while the messages were hot
// 3. Upsert the whole batch in one transaction (idempotent by message id)
// 4. Only after commit: remove exactly the staged members from the hot
//    cache and drop the staging copy, atomically
//
// A failure before step 4 leaves both caches untouched, so readers still see
// every message and a retry re-runs the same batch. Messages appended during
// a drain are not staged and stay in the hot cache for the next one.
//
// Failed jobs are retried with exponential backoff; after `max_attempts`
// they go to the dead-letter list.
//
// ============================================================================

use chrono::Utc;
use pairchat_config::WorkerConfig;
use pairchat_error::{AppError, AppResult};
use pairchat_metrics::{
    MESSAGES_PERSISTED_TOTAL, PERSIST_JOBS_COMPLETED, PERSIST_JOBS_DEAD_LETTERED,
    PERSIST_JOBS_ENQUEUED, PERSIST_JOBS_FAILED,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::queue::{DeadLetterJob, JobQueue, PersistJob};
use super::retry::{backoff_delay, with_retry};
use crate::hot_cache::{decode_members, HotCache};
use crate::store::MessageStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub persisted: usize,
    /// The batch came from a staging copy left by an earlier attempt
    pub resumed: bool,
}

/// Result of processing one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// Batch committed and caches cleared
    Completed(DrainOutcome),
    /// Drain failed; `job` should be requeued after `delay`
    Retrying { job: PersistJob, delay: Duration },
    /// Attempts exhausted; the job is on the dead-letter list
    DeadLettered,
}

#[derive(Clone)]
pub struct PersistenceWorker {
    hot: Arc<dyn HotCache>,
    store: Arc<dyn MessageStore>,
    queue: Arc<dyn JobQueue>,
    config: WorkerConfig,
    threshold: u64,
}

impl PersistenceWorker {
    pub fn new(
        hot: Arc<dyn HotCache>,
        store: Arc<dyn MessageStore>,
        queue: Arc<dyn JobQueue>,
        config: WorkerConfig,
        threshold: u64,
    ) -> Self {
        Self {
            hot,
            store,
            queue,
            config,
            threshold,
        }
    }

    /// Move one conversation's hot cache into the durable store
    pub async fn drain(&self, conversation_id: Uuid) -> AppResult<DrainOutcome> {
        let batch = self.hot.stage(conversation_id).await?;
        if batch.is_empty() {
            debug!(conversation_id = %conversation_id, "Nothing to drain");
            return Ok(DrainOutcome::default());
        }
        if batch.resumed {
            info!(
                conversation_id = %conversation_id,
                staged = batch.entries.len(),
                "Resuming interrupted drain"
            );
        }

        let read_markers = self.hot.read_markers(conversation_id).await?;
        let mut messages = decode_members(
            conversation_id,
            batch.entries.iter().map(|entry| entry.member.as_str()),
        );
        messages.retain(|m| m.conversation_id == conversation_id);
        for message in &mut messages {
            let read_through = read_markers.get(&message.receiver_id);
            if read_through.is_some_and(|at| message.created_at.timestamp_millis() <= *at) {
                message.read = true;
            }
        }

        self.store.upsert_messages(&messages).await?;

        with_retry("clear_staged", self.config.initial_backoff_ms, || {
            self.hot.clear_staged(conversation_id, &batch)
        })
        .await?;

        MESSAGES_PERSISTED_TOTAL.inc_by(messages.len() as u64);
        Ok(DrainOutcome {
            persisted: messages.len(),
            resumed: batch.resumed,
        })
    }

    /// Drain the job's conversation and settle the job
    pub async fn process(&self, job: PersistJob) -> ProcessResult {
        let conversation_id = job.conversation_id;
        match self.drain(conversation_id).await {
            Ok(outcome) => {
                PERSIST_JOBS_COMPLETED.inc();
                info!(
                    conversation_id = %conversation_id,
                    persisted = outcome.persisted,
                    resumed = outcome.resumed,
                    "Persistence job completed"
                );
                if let Err(e) = self.queue.complete(&job).await {
                    warn!(error = %e, "Failed to release persistence job claim");
                }
                self.enqueue_if_over_threshold(conversation_id).await;
                ProcessResult::Completed(outcome)
            }
            Err(e) => {
                PERSIST_JOBS_FAILED.inc();
                let failed = job.next_attempt();
                if failed.attempt >= self.config.max_attempts {
                    self.dead_letter(failed, &e).await;
                    ProcessResult::DeadLettered
                } else {
                    let delay = backoff_delay(self.config.initial_backoff_ms, failed.attempt);
                    warn!(
                        conversation_id = %conversation_id,
                        attempt = failed.attempt,
                        max_attempts = self.config.max_attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Persistence job failed, will retry"
                    );
                    ProcessResult::Retrying { job: failed, delay }
                }
            }
        }
    }

    /// Messages that arrived during a drain may already exceed the
    /// threshold again; their enqueue was absorbed by the pending claim.
    async fn enqueue_if_over_threshold(&self, conversation_id: Uuid) {
        let remaining = match self.hot.len(conversation_id).await {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!(error = %e, "Failed to re-check hot cache size after drain");
                return;
            }
        };
        if remaining < self.threshold {
            return;
        }
        match self.queue.enqueue(conversation_id).await {
            Ok(true) => {
                PERSIST_JOBS_ENQUEUED.inc();
                debug!(conversation_id = %conversation_id, remaining, "Follow-up drain enqueued");
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to enqueue follow-up drain"),
        }
    }

    async fn dead_letter(&self, job: PersistJob, cause: &AppError) {
        PERSIST_JOBS_DEAD_LETTERED.inc();
        let record = DeadLetterJob {
            attempts: job.attempt,
            failure_reason: cause.to_string(),
            dead_lettered_at: Utc::now().timestamp_millis(),
            job,
        };
        error!(
            target: "dlq",
            conversation_id = %record.job.conversation_id,
            attempts = record.attempts,
            record = %serde_json::to_string(&record).unwrap_or_default(),
            "Persistence job moved to dead-letter list"
        );
        if let Err(e) = self.queue.dead_letter(record).await {
            error!(target: "dlq", error = %e, "Failed to record dead-lettered job");
        }
    }

    fn schedule_retry(&self, job: PersistJob, delay: Duration) {
        let queue = self.queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.retry(job.clone()).await {
                error!(
                    conversation_id = %job.conversation_id,
                    error = %e,
                    "Failed to requeue persistence job"
                );
            }
        });
    }

    /// Queue a drain for every staging copy an earlier process left behind.
    ///
    /// The job that staged the copy was already popped and its claim may
    /// still be live, so the claim is taken over instead of respected. Run
    /// once at startup, before the workers poll.
    pub async fn recover_staged(&self) -> AppResult<usize> {
        let staged = self.hot.staged_conversations().await?;
        for conversation_id in &staged {
            self.queue.requeue(*conversation_id).await?;
            PERSIST_JOBS_ENQUEUED.inc();
        }
        if !staged.is_empty() {
            info!(requeued = staged.len(), "Recovered interrupted drains");
        }
        Ok(staged.len())
    }

    /// Start `concurrency` polling loops that stop when `shutdown` flips to true
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let worker = Arc::new(self);
        (0..worker.config.concurrency.max(1))
            .map(|index| {
                let worker = worker.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { worker.run_loop(index, shutdown).await })
            })
            .collect()
    }

    async fn run_loop(&self, index: usize, mut shutdown: watch::Receiver<bool>) {
        let idle = Duration::from_millis(self.config.poll_interval_ms);
        let mut consecutive_errors: u32 = 0;
        info!(worker = index, "Persistence worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.queue.next().await {
                Ok(Some(job)) => {
                    consecutive_errors = 0;
                    if let ProcessResult::Retrying { job, delay } = self.process(job).await {
                        self.schedule_retry(job, delay);
                    }
                    continue;
                }
                Ok(None) => idle,
                Err(e) => {
                    consecutive_errors += 1;
                    error!(
                        worker = index,
                        consecutive_errors,
                        error = %e,
                        "Failed to poll persistence queue"
                    );
                    backoff_delay(self.config.initial_backoff_ms, consecutive_errors)
                }
            };

            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(worker = index, "Persistence worker stopped");
    }
}
