// ============================================================================
// Cache Configuration
// ============================================================================

use crate::constants::*;

/// Tuning for the hot message cache, conversation summaries and profile cache
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Hot cache size at which a persistence job is enqueued
    pub hot_cache_threshold: u64,
    /// Number of conversations kept in each user's summary list
    pub max_conversations: isize,
    /// Preview length (chars) stored in conversation details
    pub preview_chars: usize,
    pub profile_cache_ttl_secs: u64,
    pub read_marker_ttl_secs: u64,
    /// Page size used when a request does not carry one
    pub default_page_limit: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_cache_threshold: DEFAULT_HOT_CACHE_THRESHOLD,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            profile_cache_ttl_secs: DEFAULT_PROFILE_CACHE_TTL_SECS,
            read_marker_ttl_secs: DEFAULT_READ_MARKER_TTL_SECS,
            default_page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl CacheConfig {
    pub(crate) fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hot_cache_threshold: std::env::var("HOT_CACHE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.hot_cache_threshold),
            max_conversations: std::env::var("MAX_CACHED_CONVERSATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_conversations),
            preview_chars: std::env::var("CONVERSATION_PREVIEW_CHARS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.preview_chars),
            profile_cache_ttl_secs: std::env::var("PROFILE_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.profile_cache_ttl_secs),
            read_marker_ttl_secs: std::env::var("READ_MARKER_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.read_marker_ttl_secs),
            default_page_limit: std::env::var("DEFAULT_PAGE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.default_page_limit),
        }
    }
}
