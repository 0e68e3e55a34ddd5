// ============================================================================
// Message Router
// ============================================================================
//
// Handles everything a connected client does over its socket: announcing
// presence, opening a conversation room, sending a private message.
//
// Send path, in order:
//  1. Build the message (time-ordered id, ms timestamp, unread)
//  2. Resolve sender and receiver profiles
//  3. Snapshot the room; push one copy to every socket in it, each carrying
//     the counterpart relative to that socket's user
//  4. Append to the hot cache
//  5. Receiver not in the room: bump their unseen counter
//  6. Record activity in the summary cache (both lists, details, trim)
//  7. Push refreshed conversation lists to both users if online
//  8. Detached: update the durable conversation row and enqueue a drain
//     once the hot cache reaches the threshold
//
// Errors after step 3 are reported to the sender; a message already pushed
// to a room is not taken back.
//
// ============================================================================

use pairchat_config::{CacheConfig, LoggingConfig};
use pairchat_error::{AppError, AppResult};
use pairchat_metrics::{
    LIVE_DELIVERIES_TOTAL, MESSAGES_SENT_TOTAL, PERSIST_JOBS_ENQUEUED, SEND_FANOUT_SECONDS,
    UNSEEN_INCREMENTS_TOTAL,
};
use pairchat_types::{
    DeliveredMessage, JoinPrivateChat, Message, SendPrivateMessage, ServerMessage,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::Backends;
use crate::history::HistoryReader;
use crate::hot_cache::HotCache;
use crate::persistence::JobQueue;
use crate::profiles::ProfileDirectory;
use crate::registry::{ConnectionRegistry, SessionHandle};
use crate::store::MessageStore;
use crate::summary::{peer_of, ActivityUpdate, SummaryCache};
use crate::utils::log_user;

/// Reply sent for a successful joinApp
pub const JOIN_APP_MESSAGE: &str = "Joined app successfully";

/// A routed message plus the detached bookkeeping task
#[derive(Debug)]
pub struct SentMessage {
    pub message: Message,
    pub bookkeeping: JoinHandle<()>,
}

pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    hot: Arc<dyn HotCache>,
    summaries: Arc<dyn SummaryCache>,
    store: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileDirectory>,
    queue: Arc<dyn JobQueue>,
    history: Arc<HistoryReader>,
    cache: CacheConfig,
    logging: LoggingConfig,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        backends: &Backends,
        history: Arc<HistoryReader>,
        cache: CacheConfig,
        logging: LoggingConfig,
    ) -> Self {
        Self {
            registry,
            hot: backends.hot.clone(),
            summaries: backends.summaries.clone(),
            store: backends.store.clone(),
            profiles: backends.profiles.clone(),
            queue: backends.queue.clone(),
            history,
            cache,
            logging,
        }
    }

    // ========================================================================
    // Presence
    // ========================================================================

    /// Make this socket the user's live session
    pub async fn connect(&self, session: &SessionHandle) {
        if let Some(replaced) = self.registry.register(session.clone()).await {
            info!(
                user = %log_user(session.user_id, &self.logging),
                replaced_connection = %replaced.connection_id,
                "Session replaced by a newer connection"
            );
        }
    }

    /// joinApp: (re)register and warm the profile cache
    pub async fn join_app(&self, session: &SessionHandle) -> ServerMessage {
        self.connect(session).await;
        if let Err(e) = self.profiles.warm(session.user_id).await {
            warn!(error = %e, "Failed to warm profile cache");
        }
        ServerMessage::JoinApp {
            message: JOIN_APP_MESSAGE.to_string(),
        }
    }

    /// Socket closed: drop the session and its room, evict cached profile
    /// data once the user has no live session left
    pub async fn disconnect(&self, session: &SessionHandle) {
        let offline = self
            .registry
            .unregister(session.user_id, session.connection_id)
            .await;
        if offline {
            if let Err(e) = self.profiles.evict(session.user_id).await {
                debug!(error = %e, "Failed to evict profile cache entry");
            }
        }
    }

    // ========================================================================
    // Rooms
    // ========================================================================

    /// Open a conversation room, creating the conversation when only the
    /// peer is given. Leaves the previously open room and clears the
    /// caller's unseen counter.
    pub async fn join_private_chat(
        &self,
        session: &SessionHandle,
        request: JoinPrivateChat,
    ) -> AppResult<Uuid> {
        let user_id = session.user_id;
        let conversation_id = match (request.conversation_id, request.user2_id) {
            (Some(conversation_id), _) => {
                peer_of(
                    self.summaries.as_ref(),
                    self.store.as_ref(),
                    conversation_id,
                    user_id,
                )
                .await?;
                conversation_id
            }
            (None, Some(peer_id)) => {
                if peer_id == user_id {
                    return Err(AppError::validation("cannot open a conversation with yourself"));
                }
                let conversation = self
                    .store
                    .find_or_create_conversation(user_id, peer_id)
                    .await?;
                self.summaries.remember_participants(&conversation).await?;
                conversation.id
            }
            (None, None) => {
                return Err(AppError::validation("conversationId or user2Id is required"))
            }
        };

        if let Some(previous) = self.registry.join_room(conversation_id, session).await {
            debug!(
                from = %previous,
                to = %conversation_id,
                "Socket moved to another conversation room"
            );
        }
        self.summaries
            .clear_unseen(conversation_id, user_id)
            .await?;
        Ok(conversation_id)
    }

    // ========================================================================
    // Send
    // ========================================================================

    pub async fn send_private_message(
        &self,
        sender_id: Uuid,
        request: SendPrivateMessage,
    ) -> AppResult<SentMessage> {
        let conversation_id = request.conversation_id;
        let receiver_id = request.receiver_id;
        if sender_id == receiver_id {
            return Err(AppError::validation("cannot send a message to yourself"));
        }
        let peer = peer_of(
            self.summaries.as_ref(),
            self.store.as_ref(),
            conversation_id,
            sender_id,
        )
        .await?;
        if peer != receiver_id {
            return Err(AppError::forbidden(
                "receiver is not a participant of this conversation",
            ));
        }

        let media_url = request
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let message = Message::new(
            conversation_id,
            sender_id,
            receiver_id,
            request.content,
            media_url,
        );

        let (sender_profile, receiver_profile) = tokio::try_join!(
            self.profiles.profile(sender_id),
            self.profiles.profile(receiver_id)
        )?;

        let fanout_timer = SEND_FANOUT_SECONDS.start_timer();
        let room = self.registry.room_members(conversation_id).await;
        for session in &room {
            let counterpart = if session.user_id == sender_id {
                receiver_profile.clone()
            } else {
                sender_profile.clone()
            };
            let delivered = ServerMessage::ReceivePrivateMessage(DeliveredMessage {
                message: message.clone(),
                receiver: counterpart,
            });
            if session.send(delivered) {
                LIVE_DELIVERIES_TOTAL.inc();
            }
        }
        fanout_timer.observe_duration();
        MESSAGES_SENT_TOTAL.inc();

        let hot_size = self.hot.append(&message).await?;

        let receiver_in_room = room.iter().any(|s| s.user_id == receiver_id);
        if !receiver_in_room {
            self.summaries
                .increment_unseen(conversation_id, receiver_id)
                .await?;
            UNSEEN_INCREMENTS_TOTAL.inc();
        }

        let preview = message.preview(self.cache.preview_chars);
        self.summaries
            .record_activity(&ActivityUpdate {
                conversation_id,
                sender_id,
                receiver_id,
                preview: preview.clone(),
                at: message.created_at,
            })
            .await?;

        self.push_conversation_list(sender_id).await?;
        self.push_conversation_list(receiver_id).await?;

        debug!(
            message_id = %message.id,
            conversation_id = %conversation_id,
            sender = %log_user(sender_id, &self.logging),
            live_copies = room.len(),
            hot_size,
            "Message routed"
        );

        let bookkeeping = self.spawn_bookkeeping(&message, preview, hot_size);
        Ok(SentMessage {
            message,
            bookkeeping,
        })
    }

    /// First page of the user's conversation list, pushed to their socket
    pub async fn push_conversation_list(&self, user_id: Uuid) -> AppResult<()> {
        let Some(session) = self.registry.lookup(user_id).await else {
            return Ok(());
        };
        let result = self
            .history
            .conversation_list(user_id, 1, self.cache.default_page_limit)
            .await?;
        session.send(ServerMessage::ConversationList { result });
        Ok(())
    }

    fn spawn_bookkeeping(&self, message: &Message, preview: String, hot_size: u64) -> JoinHandle<()> {
        let store = self.store.clone();
        let queue = self.queue.clone();
        let threshold = self.cache.hot_cache_threshold;
        let conversation_id = message.conversation_id;
        let at = message.created_at;

        tokio::spawn(async move {
            if let Err(e) = store.touch_conversation(conversation_id, &preview, at).await {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Failed to record conversation activity in the store"
                );
            }

            if hot_size < threshold {
                return;
            }
            match queue.enqueue(conversation_id).await {
                Ok(true) => {
                    PERSIST_JOBS_ENQUEUED.inc();
                    info!(conversation_id = %conversation_id, hot_size, "Persistence job enqueued");
                }
                Ok(false) => {
                    debug!(conversation_id = %conversation_id, "Persistence job already pending");
                }
                Err(e) => {
                    error!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "Failed to enqueue persistence job"
                    );
                }
            }
        })
    }
}
