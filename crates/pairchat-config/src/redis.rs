// ============================================================================
// Redis Configuration
// ============================================================================

/// Redis key prefixes configuration
#[derive(Clone, Debug)]
pub struct RedisKeyPrefixes {
    /// Hot cache zset: "chat:messages:{conversation_id}"
    pub hot_messages: String,
    /// Staging copy taken before a drain: "chat:staging:{conversation_id}"
    pub staging: String,
    /// Read markers for still-hot messages: "chat:read:{conversation_id}"
    pub read_marker: String,
    /// Per-user ranked conversation ids: "conversation:list:{user_id}"
    pub conversation_list: String,
    /// Per-conversation detail hash: "conversation:details:{conversation_id}"
    pub conversation_details: String,
    /// Per-conversation unseen counters: "conversation:unseen:{conversation_id}"
    pub unseen: String,
    /// Profile cache hash: "user:{user_id}"
    pub user: String,
    /// Pending persistence jobs (list)
    pub persist_queue: String,
    /// Per-conversation job dedup key: "persist:job:{conversation_id}"
    pub persist_job: String,
    /// Dead-lettered persistence jobs (list)
    pub dead_letter: String,
}

impl Default for RedisKeyPrefixes {
    fn default() -> Self {
        Self {
            hot_messages: "chat:messages:".to_string(),
            staging: "chat:staging:".to_string(),
            read_marker: "chat:read:".to_string(),
            conversation_list: "conversation:list:".to_string(),
            conversation_details: "conversation:details:".to_string(),
            unseen: "conversation:unseen:".to_string(),
            user: "user:".to_string(),
            persist_queue: "persist:queue".to_string(),
            persist_job: "persist:job:".to_string(),
            dead_letter: "persist:dead_letter".to_string(),
        }
    }
}

impl RedisKeyPrefixes {
    pub(crate) fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, default: String| std::env::var(name).unwrap_or(default);
        Self {
            hot_messages: var("REDIS_KEY_PREFIX_HOT_MESSAGES", defaults.hot_messages),
            staging: var("REDIS_KEY_PREFIX_STAGING", defaults.staging),
            read_marker: var("REDIS_KEY_PREFIX_READ_MARKER", defaults.read_marker),
            conversation_list: var(
                "REDIS_KEY_PREFIX_CONVERSATION_LIST",
                defaults.conversation_list,
            ),
            conversation_details: var(
                "REDIS_KEY_PREFIX_CONVERSATION_DETAILS",
                defaults.conversation_details,
            ),
            unseen: var("REDIS_KEY_PREFIX_UNSEEN", defaults.unseen),
            user: var("REDIS_KEY_PREFIX_USER", defaults.user),
            persist_queue: var("REDIS_KEY_PERSIST_QUEUE", defaults.persist_queue),
            persist_job: var("REDIS_KEY_PREFIX_PERSIST_JOB", defaults.persist_job),
            dead_letter: var("REDIS_KEY_DEAD_LETTER", defaults.dead_letter),
        }
    }

    /// Keys are built as `{prefix}{id}`, so a prefix with a trailing
    /// `*` matches every key of that family in SCAN.
    pub fn pattern(prefix: &str) -> String {
        format!("{}*", prefix)
    }
}
