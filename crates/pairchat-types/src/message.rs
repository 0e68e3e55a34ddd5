use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Preview shown for a message that carries only an attachment
pub const IMAGE_PREVIEW: &str = "📷 Image";

// ============================================================================
// Message
// ============================================================================

/// One private chat message.
///
/// The same record lives first in the hot cache and later in the durable
/// store; `id` never changes between the two. Field order matters: `id` is
/// serialized first so equal-score cache members sort by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Build a new unread message with a time-ordered id
    pub fn new(
        conversation_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: String,
        media_url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            sender_id,
            receiver_id,
            content,
            media_url,
            created_at: now_millis(),
            read: false,
        }
    }

    /// Sort score used by the hot cache (milliseconds since epoch)
    pub fn score(&self) -> f64 {
        self.created_at.timestamp_millis() as f64
    }

    /// Short text for conversation lists
    pub fn preview(&self, max_chars: usize) -> String {
        let content = self.content.trim();
        if content.is_empty() {
            return IMAGE_PREVIEW.to_string();
        }
        content.chars().take(max_chars).collect()
    }
}

/// Current time truncated to milliseconds, the resolution of cache scores
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    #[default]
    Active,
    Archived,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "ACTIVE",
            ConversationStatus::Archived => "ARCHIVED",
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ConversationStatus::Active),
            "ARCHIVED" => Ok(ConversationStatus::Archived),
            _ => Err(format!("Unknown conversation status: {}", s)),
        }
    }
}

/// A private conversation between an unordered pair of users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub last_message: Option<String>,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The participant that is not `user_id`, if `user_id` is a participant
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        participant_peer(self.user_a, self.user_b, user_id)
    }
}

/// Canonical (sorted) form of an unordered pair
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Given both participants, return the one that is not `user_id`
pub fn participant_peer(user_a: Uuid, user_b: Uuid, user_id: Uuid) -> Option<Uuid> {
    if user_a == user_id {
        Some(user_b)
    } else if user_b == user_id {
        Some(user_a)
    } else {
        None
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Display metadata for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Profile {
    /// Placeholder used when the directory has no record for a user
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            username: "Unknown user".to_string(),
            avatar: None,
        }
    }
}
