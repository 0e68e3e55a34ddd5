// ============================================================================
// Persistence
// ============================================================================
//
// Background path from the hot cache to Postgres:
// - queue.rs  - deduplicated per-conversation drain jobs, dead-letter list
// - worker.rs - staging, transactional upsert, clear-after-commit, retries
// - retry.rs  - backoff schedule
//
// ============================================================================

pub mod queue;
pub mod retry;
pub mod worker;

pub use queue::{DeadLetterJob, JobQueue, PersistJob, RedisJobQueue};
pub use worker::{DrainOutcome, PersistenceWorker, ProcessResult};
