use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, Profile};

/// Pagination metadata attached to every list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_page: Option<u64>,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            total_page: None,
        }
    }

    /// Same as `new`, with `totalPage = ceil(total / limit)`
    pub fn with_total_page(page: u32, limit: u32, total: u64) -> Self {
        let total_page = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64)
        };
        Self {
            page,
            limit,
            total,
            total_page: Some(total_page),
        }
    }
}

/// One page of message history, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    pub data: Vec<Message>,
    pub meta: PageMeta,
}

/// One row of a user's conversation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    /// The other participant
    pub participants: Profile,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub unseen: i64,
}

impl ConversationSummary {
    pub fn private(
        conversation_id: Uuid,
        peer: Profile,
        last_message: String,
        last_message_time: DateTime<Utc>,
        unseen: i64,
    ) -> Self {
        Self {
            conversation_id,
            kind: "private".to_string(),
            participants: peer,
            last_message,
            last_message_time,
            unseen,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationPage {
    pub data: Vec<ConversationSummary>,
    pub meta: PageMeta,
}

/// Body returned by mark-as-read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub success: bool,
    pub message: String,
}
