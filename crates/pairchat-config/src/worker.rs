// ============================================================================
// Worker Configuration
// ============================================================================

use crate::constants::*;

/// Persistence worker configuration
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Number of concurrent drain loops pulling from the job queue
    pub concurrency: usize,
    /// Attempts per job before it is dead-lettered
    pub max_attempts: u32,
    /// First retry delay; doubles on every further attempt
    pub initial_backoff_ms: u64,
    /// Lifetime of the per-conversation dedup key
    pub job_dedup_ttl_secs: u64,
    /// Idle sleep between queue polls when no job is pending
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_WORKER_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            job_dedup_ttl_secs: DEFAULT_JOB_DEDUP_TTL_SECS,
            poll_interval_ms: DEFAULT_QUEUE_POLL_INTERVAL_MS,
        }
    }
}

impl WorkerConfig {
    pub(crate) fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            concurrency: std::env::var("PERSIST_WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.concurrency),
            max_attempts: std::env::var("PERSIST_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_attempts),
            initial_backoff_ms: std::env::var("PERSIST_INITIAL_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.initial_backoff_ms),
            job_dedup_ttl_secs: std::env::var("PERSIST_JOB_DEDUP_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.job_dedup_ttl_secs),
            poll_interval_ms: std::env::var("PERSIST_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.poll_interval_ms),
        }
    }
}
