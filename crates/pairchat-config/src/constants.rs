// ============================================================================
// Configuration Constants
// ============================================================================

// Default port values
pub(crate) const DEFAULT_PORT: u16 = 8080;

// Liveness: server pings every interval, drops sockets silent for longer than the timeout
pub(crate) const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;
pub(crate) const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 60;

// Hot cache / summary cache
pub(crate) const DEFAULT_HOT_CACHE_THRESHOLD: u64 = 5;
pub(crate) const DEFAULT_MAX_CONVERSATIONS: isize = 15;
pub(crate) const DEFAULT_PREVIEW_CHARS: usize = 50;
pub(crate) const DEFAULT_PROFILE_CACHE_TTL_SECS: u64 = 6 * SECONDS_PER_HOUR as u64;
pub(crate) const DEFAULT_READ_MARKER_TTL_SECS: u64 = 7 * SECONDS_PER_DAY as u64;
pub(crate) const DEFAULT_PAGE_LIMIT: u32 = 10;

// Persistence worker
pub(crate) const DEFAULT_WORKER_CONCURRENCY: usize = 4;
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub(crate) const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub(crate) const DEFAULT_JOB_DEDUP_TTL_SECS: u64 = 5 * SECONDS_PER_MINUTE as u64;
pub(crate) const DEFAULT_QUEUE_POLL_INTERVAL_MS: u64 = 500;

// Time conversion constants
pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3600;
pub const SECONDS_PER_DAY: i64 = 86400;

// Size limits (in bytes)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // text content of one chat message
pub const MAX_FRAME_SIZE: usize = 64 * 1024; // one websocket frame
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024; // chat image upload
