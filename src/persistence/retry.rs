// ============================================================================
// Retry with exponential backoff
// ============================================================================
//
// Backoff schedule shared by the worker loops: a failed job is requeued
// after `initial * 2^(attempt-1)`, capped, and short Redis steps that must
// not be abandoned halfway (clearing a committed batch) are retried in place.
//
// ============================================================================

use pairchat_error::AppResult;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const IN_PLACE_RETRIES: u32 = 3;

/// Delay before retry number `attempt` (1-based)
pub fn backoff_delay(initial_backoff_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay_ms = initial_backoff_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay_ms).min(MAX_BACKOFF)
}

/// Run `operation` up to three times, sleeping between transient failures.
/// Non-transient errors are returned immediately.
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    initial_backoff_ms: u64,
    mut operation: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_transient() && attempt < IN_PLACE_RETRIES => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    max_retries = IN_PLACE_RETRIES,
                    error = %e,
                    "Operation failed, will retry"
                );
                tokio::time::sleep(backoff_delay(initial_backoff_ms, attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
