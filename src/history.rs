// ============================================================================
// History Reader
// ============================================================================
//
// Paginated, newest-first history merged from the hot cache and the durable
// store, plus the conversation list.
//
// The hot cache is read once per request as a snapshot. The durable side is
// counted and queried with the snapshot's ids excluded, so a message that is
// mid-drain (already committed, not yet cleared from the cache) is counted
// and returned once.
//
// Reading history is also what marks a conversation read for the caller.
//
// ============================================================================

use pairchat_error::{AppError, AppResult};
use pairchat_types::{
    ConversationPage, ConversationSummary, Message, MessagePage, PageMeta, ReadReceipt,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::Backends;
use crate::hot_cache::HotCache;
use crate::pagination::{resolve_window, Window};
use crate::profiles::ProfileDirectory;
use crate::store::MessageStore;
use crate::summary::{peer_of, SummaryCache};

pub struct HistoryReader {
    hot: Arc<dyn HotCache>,
    store: Arc<dyn MessageStore>,
    summaries: Arc<dyn SummaryCache>,
    profiles: Arc<dyn ProfileDirectory>,
}

fn slice_newest_first(hot: &[Message], start: u64, stop: u64) -> Vec<Message> {
    let start = (start as usize).min(hot.len());
    let end = (stop as usize + 1).min(hot.len());
    hot[start..end].to_vec()
}

impl HistoryReader {
    pub fn new(backends: &Backends) -> Self {
        Self {
            hot: backends.hot.clone(),
            store: backends.store.clone(),
            summaries: backends.summaries.clone(),
            profiles: backends.profiles.clone(),
        }
    }

    /// One page of a conversation's history for a participant.
    ///
    /// Marks the conversation read for `user_id` afterwards.
    pub async fn merged_messages(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> AppResult<MessagePage> {
        if limit == 0 {
            return Err(AppError::validation("limit must be greater than 0"));
        }
        peer_of(
            self.summaries.as_ref(),
            self.store.as_ref(),
            conversation_id,
            user_id,
        )
        .await?;

        let hot = self.hot.snapshot(conversation_id).await?;
        let hot_ids: Vec<Uuid> = hot.iter().map(|m| m.id).collect();
        let durable_count = self.store.count_messages(conversation_id, &hot_ids).await?;
        let redis_count = hot.len() as u64;
        let resolved = resolve_window(redis_count + durable_count, redis_count, page, limit)?;

        let data = match resolved.window {
            Window::Empty => Vec::new(),
            Window::Hot { start, stop } => slice_newest_first(&hot, start, stop),
            Window::Straddle {
                hot_start,
                hot_stop,
                cold_take,
            } => {
                let mut data = slice_newest_first(&hot, hot_start, hot_stop);
                data.extend(
                    self.store
                        .messages_newest_first(conversation_id, 0, cold_take, &hot_ids)
                        .await?,
                );
                data
            }
            Window::Cold { offset, take } => {
                self.store
                    .messages_newest_first(conversation_id, offset, take, &hot_ids)
                    .await?
            }
        };

        self.mark_conversation_read(conversation_id, user_id).await?;

        Ok(MessagePage {
            data,
            meta: PageMeta::with_total_page(resolved.page, resolved.limit, resolved.total),
        })
    }

    /// History with a peer, looked up by the pair. No conversation yet
    /// means an empty first page.
    pub async fn direct_messages(
        &self,
        user_id: Uuid,
        peer_id: Uuid,
        page: u32,
        limit: u32,
    ) -> AppResult<MessagePage> {
        if limit == 0 {
            return Err(AppError::validation("limit must be greater than 0"));
        }
        if user_id == peer_id {
            return Err(AppError::validation("cannot read a conversation with yourself"));
        }
        match self.store.find_conversation_by_pair(user_id, peer_id).await? {
            Some(conversation) => {
                self.merged_messages(conversation.id, user_id, page, limit)
                    .await
            }
            None => Ok(MessagePage {
                data: Vec::new(),
                meta: PageMeta::with_total_page(page.max(1), limit, 0),
            }),
        }
    }

    /// Explicit mark-as-read for a participant
    pub async fn mark_as_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt> {
        peer_of(
            self.summaries.as_ref(),
            self.store.as_ref(),
            conversation_id,
            user_id,
        )
        .await?;
        let updated = self.mark_conversation_read(conversation_id, user_id).await?;
        Ok(ReadReceipt {
            success: true,
            message: format!("{} messages marked as read", updated),
        })
    }

    /// Stored messages are flagged now; hot ones are flagged when drained
    async fn mark_conversation_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<u64> {
        let updated = self.store.mark_read(conversation_id, user_id).await?;
        self.hot
            .mark_read_through(conversation_id, user_id, pairchat_types::now_millis())
            .await?;
        self.summaries
            .clear_unseen(conversation_id, user_id)
            .await?;
        Ok(updated)
    }

    /// The user's conversations, most recent first. Served from the summary
    /// cache; the durable store answers pages the cache does not hold.
    ///
    /// A list at its cap only covers the newest conversations. Its total is
    /// counted in the store, and a page reaching past the cap is read from
    /// the store.
    pub async fn conversation_list(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> AppResult<ConversationPage> {
        if limit == 0 {
            return Err(AppError::validation("limit must be greater than 0"));
        }
        let page = page.max(1);

        if let Some(cached) = self
            .summaries
            .conversation_page(user_id, page, limit)
            .await?
        {
            let total = if !cached.at_capacity {
                Some(cached.total)
            } else if cached.entries.len() >= limit as usize {
                Some(self.store.count_conversations(user_id).await?)
            } else {
                None
            };
            if let Some(total) = total {
                let mut data = Vec::with_capacity(cached.entries.len());
                for entry in cached.entries {
                    let Some(peer) =
                        pairchat_types::participant_peer(entry.user_a, entry.user_b, user_id)
                    else {
                        continue;
                    };
                    data.push(ConversationSummary::private(
                        entry.conversation_id,
                        self.profiles.profile(peer).await?,
                        entry.last_message,
                        entry.last_activity,
                        entry.unseen,
                    ));
                }
                return Ok(ConversationPage {
                    data,
                    meta: PageMeta::new(page, limit, total.max(cached.total)),
                });
            }
        }

        let offset = (page as u64 - 1) * limit as u64;
        let (rows, total) = self
            .store
            .conversation_page(user_id, offset, limit)
            .await?;
        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let conversation = row.conversation;
            let Some(peer) = conversation.other_participant(user_id) else {
                continue;
            };
            data.push(ConversationSummary::private(
                conversation.id,
                self.profiles.profile(peer).await?,
                conversation.last_message.unwrap_or_default(),
                conversation.updated_at,
                row.unread,
            ));
        }
        Ok(ConversationPage {
            data,
            meta: PageMeta::new(page, limit, total),
        })
    }
}
