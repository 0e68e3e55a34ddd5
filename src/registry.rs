// ============================================================================
// Connection Registry
// ============================================================================
//
// Process-wide map of live sessions, one per user, plus the conversation
// rooms those sessions currently have open. A user can be online without
// being in any room; rooms decide live fan-out, the session map decides
// whether a user can be reached at all.
//
// All three maps live behind one lock so a register/unregister/join is
// observed atomically. The lock is never held across an await.
//
// ============================================================================

use pairchat_metrics::ACTIVE_CONNECTIONS;
use pairchat_types::ServerMessage;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub type SessionSender = mpsc::UnboundedSender<ServerMessage>;

/// A live socket: the outbound queue drained by its connection loop
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    tx: SessionSender,
}

impl SessionHandle {
    pub fn new(user_id: Uuid, tx: SessionSender) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            user_id,
            tx,
        }
    }

    /// Queue a frame for this socket. Returns false if the socket is gone;
    /// callers treat that as best effort and move on.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Default)]
struct RegistryState {
    /// user id -> live session
    sessions: HashMap<Uuid, SessionHandle>,
    /// conversation id -> (connection id -> session)
    rooms: HashMap<Uuid, HashMap<Uuid, SessionHandle>>,
    /// connection id -> the one conversation room it has open
    memberships: HashMap<Uuid, Uuid>,
}

impl RegistryState {
    fn leave_room(&mut self, connection_id: Uuid) -> Option<Uuid> {
        let conversation_id = self.memberships.remove(&connection_id)?;
        if let Some(room) = self.rooms.get_mut(&conversation_id) {
            room.remove(&connection_id);
            if room.is_empty() {
                self.rooms.remove(&conversation_id);
            }
        }
        Some(conversation_id)
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session` the user's live session. A previous session for the
    /// same user is replaced and loses its room membership; it is returned
    /// so the caller can log it.
    pub async fn register(&self, session: SessionHandle) -> Option<SessionHandle> {
        let mut state = self.state.write().await;
        let previous = state.sessions.insert(session.user_id, session.clone());
        if let Some(old) = &previous {
            if old.connection_id != session.connection_id {
                state.leave_room(old.connection_id);
            }
        }
        ACTIVE_CONNECTIONS.set(state.sessions.len() as i64);
        previous.filter(|old| old.connection_id != session.connection_id)
    }

    pub async fn lookup(&self, user_id: Uuid) -> Option<SessionHandle> {
        self.state.read().await.sessions.get(&user_id).cloned()
    }

    /// Remove a disconnected socket.
    ///
    /// The user entry is only dropped if it still points at this
    /// connection, so a late disconnect from a replaced socket cannot evict
    /// the newer session. Room membership is always cleaned up. Returns true
    /// when the user no longer has a live session.
    pub async fn unregister(&self, user_id: Uuid, connection_id: Uuid) -> bool {
        let mut state = self.state.write().await;
        state.leave_room(connection_id);

        let owns_entry = state
            .sessions
            .get(&user_id)
            .is_some_and(|current| current.connection_id == connection_id);
        if owns_entry {
            state.sessions.remove(&user_id);
        }
        ACTIVE_CONNECTIONS.set(state.sessions.len() as i64);
        !state.sessions.contains_key(&user_id)
    }

    /// Put a socket into a conversation room, leaving whatever room it had
    /// open before. Returns the previous room.
    pub async fn join_room(&self, conversation_id: Uuid, session: &SessionHandle) -> Option<Uuid> {
        let mut state = self.state.write().await;
        let previous = state.leave_room(session.connection_id);
        state
            .rooms
            .entry(conversation_id)
            .or_default()
            .insert(session.connection_id, session.clone());
        state
            .memberships
            .insert(session.connection_id, conversation_id);
        previous.filter(|room| *room != conversation_id)
    }

    pub async fn leave_room(&self, connection_id: Uuid) -> Option<Uuid> {
        self.state.write().await.leave_room(connection_id)
    }

    /// Sockets that currently have the conversation open
    pub async fn room_members(&self, conversation_id: Uuid) -> Vec<SessionHandle> {
        self.state
            .read()
            .await
            .rooms
            .get(&conversation_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn is_in_room(&self, conversation_id: Uuid, user_id: Uuid) -> bool {
        self.state
            .read()
            .await
            .rooms
            .get(&conversation_id)
            .is_some_and(|room| room.values().any(|s| s.user_id == user_id))
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}
