//! In-memory backends for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pairchat_config::{
    CacheConfig, Config, DbConfig, LoggingConfig, MediaConfig, RedisKeyPrefixes, WorkerConfig,
};
use pairchat_db::ConversationWithUnread;
use pairchat_error::{AppError, AppResult};
use pairchat_types::{ordered_pair, Conversation, ConversationStatus, Message, Profile};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::JwtValidator;
use crate::context::{AppContext, Backends, HealthCheck};
use crate::hot_cache::{decode_members, HotCache, StagedBatch, StagedEntry};
use crate::media::DiskMediaStorage;
use crate::persistence::{DeadLetterJob, JobQueue, PersistJob};
use crate::profiles::ProfileDirectory;
use crate::registry::SessionHandle;
use crate::store::MessageStore;
use crate::summary::{ActivityUpdate, CachedConversation, CachedConversationPage, SummaryCache};

pub const TEST_JWT_SECRET: &str = "unit-test-secret-with-at-least-32-chars";

fn outage() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

// ============================================================================
// Hot cache
// ============================================================================

#[derive(Default)]
struct HotState {
    /// (score, member), kept sorted ascending like a zset
    live: HashMap<Uuid, Vec<(f64, String)>>,
    staging: HashMap<Uuid, Vec<(f64, String)>>,
    read: HashMap<Uuid, HashMap<Uuid, i64>>,
}

fn sorted_insert(set: &mut Vec<(f64, String)>, score: f64, member: String) {
    set.retain(|(_, m)| *m != member);
    let at = set
        .iter()
        .position(|(s, m)| (*s, m.as_str()) > (score, member.as_str()))
        .unwrap_or(set.len());
    set.insert(at, (score, member));
}

#[derive(Default)]
pub struct InMemoryHotCache {
    state: Mutex<HotState>,
}

impl InMemoryHotCache {
    /// Leave a staging copy behind, as a crashed drain would
    pub fn leave_staged(&self, conversation_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        let live = state.live.get(&conversation_id).cloned().unwrap_or_default();
        state.staging.insert(conversation_id, live);
    }

    pub fn has_staging(&self, conversation_id: Uuid) -> bool {
        self.state
            .lock()
            .unwrap()
            .staging
            .contains_key(&conversation_id)
    }
}

#[async_trait]
impl HotCache for InMemoryHotCache {
    async fn append(&self, message: &Message) -> AppResult<u64> {
        let member = serde_json::to_string(message)?;
        let mut state = self.state.lock().unwrap();
        let set = state.live.entry(message.conversation_id).or_default();
        sorted_insert(set, message.score(), member);
        Ok(set.len() as u64)
    }

    async fn len(&self, conversation_id: Uuid) -> AppResult<u64> {
        let state = self.state.lock().unwrap();
        Ok(state.live.get(&conversation_id).map_or(0, Vec::len) as u64)
    }

    async fn snapshot(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let state = self.state.lock().unwrap();
        let members: Vec<String> = state
            .live
            .get(&conversation_id)
            .map(|set| set.iter().rev().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default();
        Ok(decode_members(
            conversation_id,
            members.iter().map(String::as_str),
        ))
    }

    async fn stage(&self, conversation_id: Uuid) -> AppResult<StagedBatch> {
        let mut state = self.state.lock().unwrap();
        let to_batch = |set: &Vec<(f64, String)>, resumed| StagedBatch {
            resumed,
            entries: set
                .iter()
                .map(|(score, member)| StagedEntry {
                    member: member.clone(),
                    score: *score,
                })
                .collect(),
        };
        if let Some(staged) = state.staging.get(&conversation_id) {
            if !staged.is_empty() {
                return Ok(to_batch(staged, true));
            }
        }
        let live = state.live.get(&conversation_id).cloned().unwrap_or_default();
        if live.is_empty() {
            return Ok(StagedBatch::default());
        }
        let batch = to_batch(&live, false);
        state.staging.insert(conversation_id, live);
        Ok(batch)
    }

    async fn clear_staged(&self, conversation_id: Uuid, batch: &StagedBatch) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let staged: HashSet<&str> = batch.entries.iter().map(|e| e.member.as_str()).collect();
        if let Some(set) = state.live.get_mut(&conversation_id) {
            set.retain(|(_, m)| !staged.contains(m.as_str()));
        }
        state.staging.remove(&conversation_id);
        Ok(())
    }

    async fn staged_conversations(&self) -> AppResult<Vec<Uuid>> {
        Ok(self.state.lock().unwrap().staging.keys().copied().collect())
    }

    async fn mark_read_through(
        &self,
        conversation_id: Uuid,
        reader: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.state
            .lock()
            .unwrap()
            .read
            .entry(conversation_id)
            .or_default()
            .insert(reader, at.timestamp_millis());
        Ok(())
    }

    async fn read_markers(&self, conversation_id: Uuid) -> AppResult<HashMap<Uuid, i64>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .read
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Summary cache
// ============================================================================

#[derive(Default)]
struct SummaryState {
    lists: HashMap<Uuid, HashMap<Uuid, i64>>,
    details: HashMap<Uuid, (Uuid, Uuid, Option<(String, i64)>)>,
    unseen: HashMap<(Uuid, Uuid), i64>,
}

pub struct InMemorySummaryCache {
    state: Mutex<SummaryState>,
    cap: usize,
}

impl InMemorySummaryCache {
    pub fn new(cap: usize) -> Self {
        Self {
            state: Mutex::new(SummaryState::default()),
            cap,
        }
    }

    pub fn list_len(&self, user_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .lists
            .get(&user_id)
            .map_or(0, HashMap::len)
    }

    fn ranked(list: &HashMap<Uuid, i64>) -> Vec<Uuid> {
        let mut ranked: Vec<(i64, Uuid)> = list.iter().map(|(id, at)| (*at, *id)).collect();
        ranked.sort_by(|a, b| b.cmp(a));
        ranked.into_iter().map(|(_, id)| id).collect()
    }
}

#[async_trait]
impl SummaryCache for InMemorySummaryCache {
    async fn record_activity(&self, update: &ActivityUpdate) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let at = update.at.timestamp_millis();
        for user in [update.sender_id, update.receiver_id] {
            let list = state.lists.entry(user).or_default();
            list.insert(update.conversation_id, at);
            let keep: HashSet<Uuid> = Self::ranked(list).into_iter().take(self.cap).collect();
            list.retain(|id, _| keep.contains(id));
        }
        state.details.insert(
            update.conversation_id,
            (
                update.sender_id,
                update.receiver_id,
                Some((update.preview.clone(), at)),
            ),
        );
        Ok(())
    }

    async fn conversation_page(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> AppResult<Option<CachedConversationPage>> {
        let state = self.state.lock().unwrap();
        let Some(list) = state.lists.get(&user_id) else {
            return Ok(None);
        };
        let ranked = Self::ranked(list);
        let start = (page.max(1) as usize - 1) * limit as usize;
        let entries: Vec<CachedConversation> = ranked
            .iter()
            .skip(start)
            .take(limit as usize)
            .filter_map(|id| {
                let (user_a, user_b, activity) = state.details.get(id)?;
                let (last_message, at) = activity.clone()?;
                Some(CachedConversation {
                    conversation_id: *id,
                    user_a: *user_a,
                    user_b: *user_b,
                    last_message,
                    last_activity: DateTime::from_timestamp_millis(at)?,
                    unseen: state.unseen.get(&(*id, user_id)).copied().unwrap_or(0),
                })
            })
            .collect();
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(CachedConversationPage {
            entries,
            total: ranked.len() as u64,
            at_capacity: ranked.len() >= self.cap,
        }))
    }

    async fn participants(&self, conversation_id: Uuid) -> AppResult<Option<(Uuid, Uuid)>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .details
            .get(&conversation_id)
            .map(|(a, b, _)| (*a, *b)))
    }

    async fn remember_participants(&self, conversation: &Conversation) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .details
            .entry(conversation.id)
            .or_insert((conversation.user_a, conversation.user_b, None));
        entry.0 = conversation.user_a;
        entry.1 = conversation.user_b;
        Ok(())
    }

    async fn increment_unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let mut state = self.state.lock().unwrap();
        let count = state.unseen.entry((conversation_id, user_id)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .unseen
            .get(&(conversation_id, user_id))
            .copied()
            .unwrap_or(0))
    }

    async fn clear_unseen(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.state
            .lock()
            .unwrap()
            .unseen
            .insert((conversation_id, user_id), 0);
        Ok(())
    }
}

// ============================================================================
// Durable store
// ============================================================================

#[derive(Default)]
struct StoreState {
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Message>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    /// Make every upsert fail like a lost connection
    pub fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn message_count(&self, conversation_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .count()
    }

    pub fn stored(&self, message_id: Uuid) -> Option<Message> {
        self.state.lock().unwrap().messages.get(&message_id).cloned()
    }

    /// Write messages directly, bypassing the hot cache
    pub fn seed_messages(&self, messages: &[Message]) {
        let mut state = self.state.lock().unwrap();
        for message in messages {
            state.messages.insert(message.id, message.clone());
        }
    }

    fn newest_first(&self, conversation_id: Uuid, exclude: &[Uuid]) -> Vec<Message> {
        let state = self.state.lock().unwrap();
        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id && !exclude.contains(&m.id))
            .cloned()
            .collect();
        messages.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        messages
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn find_or_create_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Conversation> {
        let (low, high) = ordered_pair(user_a, user_b);
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .conversations
            .values()
            .find(|c| c.user_a == low && c.user_b == high)
        {
            return Ok(existing.clone());
        }
        let now = pairchat_types::now_millis();
        let conversation = Conversation {
            id: Uuid::now_v7(),
            user_a: low,
            user_b: high,
            last_message: None,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation_by_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let (low, high) = ordered_pair(user_a, user_b);
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .values()
            .find(|c| c.user_a == low && c.user_b == high)
            .cloned())
    }

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>> {
        let state = self.state.lock().unwrap();
        Ok(state.conversations.get(&conversation_id).cloned())
    }

    async fn touch_conversation(
        &self,
        conversation_id: Uuid,
        last_message: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(conversation) = state.conversations.get_mut(&conversation_id) {
            if conversation.updated_at <= at {
                conversation.last_message = Some(last_message.to_string());
                conversation.updated_at = at;
            }
            conversation.status = ConversationStatus::Active;
        }
        Ok(())
    }

    async fn upsert_messages(&self, messages: &[Message]) -> AppResult<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(outage());
        }
        let mut state = self.state.lock().unwrap();
        for message in messages {
            let merged = match state.messages.get(&message.id) {
                Some(existing) => Message {
                    read: existing.read || message.read,
                    ..existing.clone()
                },
                None => message.clone(),
            };
            state.messages.insert(message.id, merged);
        }
        Ok(messages.len() as u64)
    }

    async fn count_messages(&self, conversation_id: Uuid, exclude: &[Uuid]) -> AppResult<u64> {
        Ok(self.newest_first(conversation_id, exclude).len() as u64)
    }

    async fn messages_newest_first(
        &self,
        conversation_id: Uuid,
        offset: u64,
        limit: u64,
        exclude: &[Uuid],
    ) -> AppResult<Vec<Message>> {
        Ok(self
            .newest_first(conversation_id, exclude)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn mark_read(&self, conversation_id: Uuid, reader: Uuid) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut updated = 0;
        for message in state.messages.values_mut() {
            if message.conversation_id == conversation_id
                && message.receiver_id == reader
                && !message.read
            {
                message.read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn conversation_page(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u32,
    ) -> AppResult<(Vec<ConversationWithUnread>, u64)> {
        let state = self.state.lock().unwrap();
        let mut conversations: Vec<&Conversation> = state
            .conversations
            .values()
            .filter(|c| c.involves(user_id) && c.status == ConversationStatus::Active)
            .collect();
        conversations.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)));
        let total = conversations.len() as u64;
        let page = conversations
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|c| ConversationWithUnread {
                conversation: c.clone(),
                unread: state
                    .messages
                    .values()
                    .filter(|m| m.conversation_id == c.id && m.receiver_id == user_id && !m.read)
                    .count() as i64,
            })
            .collect();
        Ok((page, total))
    }

    async fn count_conversations(&self, user_id: Uuid) -> AppResult<u64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .values()
            .filter(|c| c.involves(user_id) && c.status == ConversationStatus::Active)
            .count() as u64)
    }
}

// ============================================================================
// Job queue
// ============================================================================

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PersistJob>,
    claims: HashSet<Uuid>,
    dead: Vec<DeadLetterJob>,
}

#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn pending(&self) -> Vec<PersistJob> {
        self.state.lock().unwrap().pending.iter().cloned().collect()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetterJob> {
        self.state.lock().unwrap().dead.clone()
    }

    pub fn is_claimed(&self, conversation_id: Uuid) -> bool {
        self.state.lock().unwrap().claims.contains(&conversation_id)
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, conversation_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        if !state.claims.insert(conversation_id) {
            return Ok(false);
        }
        state.pending.push_back(PersistJob::new(conversation_id));
        Ok(true)
    }

    async fn next(&self) -> AppResult<Option<PersistJob>> {
        Ok(self.state.lock().unwrap().pending.pop_front())
    }

    async fn retry(&self, job: PersistJob) -> AppResult<()> {
        self.state.lock().unwrap().pending.push_back(job);
        Ok(())
    }

    async fn requeue(&self, conversation_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.claims.insert(conversation_id);
        state.pending.push_back(PersistJob::new(conversation_id));
        Ok(())
    }

    async fn complete(&self, job: &PersistJob) -> AppResult<()> {
        self.state
            .lock()
            .unwrap()
            .claims
            .remove(&job.conversation_id);
        Ok(())
    }

    async fn dead_letter(&self, record: DeadLetterJob) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.claims.remove(&record.job.conversation_id);
        state.dead.push(record);
        Ok(())
    }
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Default)]
pub struct StaticProfiles {
    profiles: Mutex<HashMap<Uuid, Profile>>,
    pub evicted: Mutex<Vec<Uuid>>,
}

impl StaticProfiles {
    pub fn add(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.profiles.lock().unwrap().insert(
            id,
            Profile {
                id,
                username: username.to_string(),
                avatar: None,
            },
        );
        id
    }
}

#[async_trait]
impl ProfileDirectory for StaticProfiles {
    async fn profile(&self, user_id: Uuid) -> AppResult<Profile> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Profile::unknown(user_id)))
    }

    async fn warm(&self, _user_id: Uuid) -> AppResult<()> {
        Ok(())
    }

    async fn evict(&self, user_id: Uuid) -> AppResult<()> {
        self.evicted.lock().unwrap().push(user_id);
        Ok(())
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub struct AlwaysHealthy;

#[async_trait]
impl HealthCheck for AlwaysHealthy {
    async fn check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Concrete in-memory backends, kept typed so tests can inspect them
pub struct TestBackends {
    pub hot: Arc<InMemoryHotCache>,
    pub summaries: Arc<InMemorySummaryCache>,
    pub store: Arc<InMemoryStore>,
    pub profiles: Arc<StaticProfiles>,
    pub queue: Arc<InMemoryQueue>,
}

impl TestBackends {
    pub fn new() -> Self {
        Self {
            hot: Arc::new(InMemoryHotCache::default()),
            summaries: Arc::new(InMemorySummaryCache::new(
                CacheConfig::default().max_conversations as usize,
            )),
            store: Arc::new(InMemoryStore::default()),
            profiles: Arc::new(StaticProfiles::default()),
            queue: Arc::new(InMemoryQueue::default()),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            hot: self.hot.clone(),
            summaries: self.summaries.clone(),
            store: self.store.clone(),
            profiles: self.profiles.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Two named users and the conversation between them
    pub async fn pair(&self) -> (Uuid, Uuid, Uuid) {
        let alice = self.profiles.add("alice");
        let bob = self.profiles.add("bob");
        let conversation = self
            .store
            .find_or_create_conversation(alice, bob)
            .await
            .unwrap();
        (alice, bob, conversation.id)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/pairchat_test".to_string(),
        redis_url: "redis://localhost:6379".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        port: 0,
        bind_address: "127.0.0.1:0".to_string(),
        heartbeat_interval_secs: 25,
        heartbeat_timeout_secs: 60,
        rust_log: "debug".to_string(),
        logging: LoggingConfig {
            enable_user_identifiers: true,
            hash_salt: "test-salt".to_string(),
        },
        db: DbConfig::default(),
        cache: CacheConfig::default(),
        worker: WorkerConfig::default(),
        media: MediaConfig {
            upload_dir: std::env::temp_dir()
                .join(format!("pairchat-test-{}", Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
            public_base_url: "http://localhost".to_string(),
            max_file_size: 1024,
        },
        redis_key_prefixes: RedisKeyPrefixes::default(),
    }
}

pub fn test_context(backends: &TestBackends) -> AppContext {
    let config = test_config();
    let media = DiskMediaStorage::new(&config.media);
    AppContext::new(
        Arc::new(config),
        backends.backends(),
        Arc::new(JwtValidator::new(TEST_JWT_SECRET)),
        Arc::new(media),
        Arc::new(AlwaysHealthy),
    )
}

/// A registered session plus the receiving end of its outbound queue
pub fn session(user_id: Uuid) -> (SessionHandle, mpsc::UnboundedReceiver<pairchat_types::ServerMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SessionHandle::new(user_id, tx), rx)
}

/// Everything currently queued for a session
pub fn drain_frames(
    rx: &mut mpsc::UnboundedReceiver<pairchat_types::ServerMessage>,
) -> Vec<pairchat_types::ServerMessage> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}
