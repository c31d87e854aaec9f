//! Common Test Utilities
//!
//! In-memory stand-ins for PostgreSQL, Redis and the blob store, plus a
//! channel-backed socket, so the gateway runs end to end without a network.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use dm_gateway::application::services::{AttachmentService, MessageServiceImpl};
use dm_gateway::domain::{
    ordered_pair, AttachmentClaims, BlobError, BlobStore, ClaimError, Conversation,
    ConversationRepository, ConversationSummary, Message, MessageRepository, Snowflake, User,
    UserRepository,
};
use dm_gateway::presentation::websocket::{
    ConnectionRegistry, FrameSink, MessagePipeline, Session, SessionError,
};
use dm_gateway::shared::background::BackgroundTasks;
use dm_gateway::shared::error::AppError;
use dm_gateway::shared::rate_limiter::RateLimiter;
use dm_gateway::shared::snowflake::SnowflakeGenerator;

pub const ALICE: Snowflake = Snowflake(1001);
pub const BOB: Snowflake = Snowflake(1002);
pub const CAROL: Snowflake = Snowflake(1003);

/// How long a test waits for a frame that should arrive.
pub const FRAME_WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// Storage
// ============================================================================

#[derive(Default)]
struct StoreState {
    users: HashMap<Snowflake, User>,
    conversations: HashMap<Snowflake, Conversation>,
    messages: Vec<Message>,
}

/// Users, conversations and messages in one map set.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn add_user(&self, id: Snowflake, name: &str) {
        self.state.lock().users.insert(
            id,
            User {
                id,
                name: name.into(),
                email: format!("{name}@example.com"),
                avatar: None,
                created_at: Utc::now(),
            },
        );
    }

    pub fn add_conversation(&self, id: Snowflake, a: Snowflake, b: Snowflake) {
        self.state
            .lock()
            .conversations
            .insert(id, Conversation::new(id, a, b));
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    pub fn last_message_of(&self, id: Snowflake) -> Option<Snowflake> {
        self.state
            .lock()
            .conversations
            .get(&id)
            .and_then(|c| c.last_message_id)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn exists(&self, id: Snowflake) -> Result<bool, AppError> {
        Ok(self.state.lock().users.contains_key(&id))
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn find_for_participant(
        &self,
        id: Snowflake,
        participant: Snowflake,
    ) -> Result<Option<Conversation>, AppError> {
        Ok(self
            .state
            .lock()
            .conversations
            .get(&id)
            .filter(|c| c.includes(participant))
            .cloned())
    }

    async fn find_by_participants(
        &self,
        a: Snowflake,
        b: Snowflake,
    ) -> Result<Option<Conversation>, AppError> {
        let pair = ordered_pair(a, b);
        Ok(self
            .state
            .lock()
            .conversations
            .values()
            .find(|c| c.participants == pair)
            .cloned())
    }

    async fn counterpart_ids(&self, user: Snowflake) -> Result<Vec<Snowflake>, AppError> {
        Ok(self
            .state
            .lock()
            .conversations
            .values()
            .filter(|c| c.includes(user))
            .map(|c| c.other_participant(user))
            .collect())
    }

    async fn list_for_user(&self, user: Snowflake) -> Result<Vec<ConversationSummary>, AppError> {
        let state = self.state.lock();
        Ok(state
            .conversations
            .values()
            .filter(|c| c.includes(user))
            .filter_map(|c| {
                let other = state.users.get(&c.other_participant(user))?;
                Some(ConversationSummary {
                    id: c.id,
                    participant: other.preview(),
                    last_message: None,
                })
            })
            .collect())
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), AppError> {
        let mut state = self.state.lock();
        if state
            .conversations
            .values()
            .any(|c| c.participants == conversation.participants)
        {
            return Err(AppError::Conflict("conversation exists".into()));
        }
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn advance_last_message(
        &self,
        id: Snowflake,
        message_id: Snowflake,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        match state.conversations.get_mut(&id) {
            Some(c) if c.last_message_id.map_or(true, |current| current < message_id) => {
                c.last_message_id = Some(message_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn retract_last_message(
        &self,
        id: Snowflake,
        deleted: Snowflake,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        let latest = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == id)
            .map(|m| m.id)
            .max();
        match state.conversations.get_mut(&id) {
            Some(c) if c.last_message_id == Some(deleted) => {
                c.last_message_id = latest;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create(&self, message: &Message) -> Result<(), AppError> {
        self.state.lock().messages.push(message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Snowflake) -> Result<Option<Message>, AppError> {
        Ok(self
            .state
            .lock()
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn find_page(
        &self,
        conversation_id: Snowflake,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<Message>, AppError> {
        let mut messages: Vec<Message> = self
            .state
            .lock()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(messages
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .collect())
    }

    async fn delete(&self, id: Snowflake) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        Ok(state.messages.len() != before)
    }
}

// ============================================================================
// Claims and blobs
// ============================================================================

#[derive(Default)]
struct ClaimState {
    active: HashSet<Snowflake>,
    data: HashMap<Snowflake, String>,
}

/// Claim store with the same two-key layout as the Redis one. TTLs are
/// simulated with [`MemoryClaims::expire_active`] and
/// [`MemoryClaims::expire_data`].
#[derive(Default)]
pub struct MemoryClaims {
    state: Mutex<ClaimState>,
}

impl MemoryClaims {
    pub fn expire_active(&self, owner: Snowflake) {
        self.state.lock().active.remove(&owner);
    }

    pub fn expire_data(&self, owner: Snowflake) {
        self.state.lock().data.remove(&owner);
    }

    pub fn data_of(&self, owner: Snowflake) -> Option<String> {
        self.state.lock().data.get(&owner).cloned()
    }
}

#[async_trait]
impl AttachmentClaims for MemoryClaims {
    async fn issue(&self, owner: Snowflake, path: &str) -> Result<Option<String>, ClaimError> {
        let mut state = self.state.lock();
        state.active.insert(owner);
        Ok(state.data.insert(owner, path.to_owned()))
    }

    async fn get(&self, owner: Snowflake) -> Result<String, ClaimError> {
        self.state
            .lock()
            .data
            .get(&owner)
            .cloned()
            .ok_or(ClaimError::NotFound)
    }

    async fn consume(&self, owner: Snowflake) -> Result<(), ClaimError> {
        let mut state = self.state.lock();
        state.active.remove(&owner);
        state.data.remove(&owner);
        Ok(())
    }

    async fn orphaned(&self, owner: Snowflake) -> Result<Option<String>, ClaimError> {
        let state = self.state.lock();
        if state.active.contains(&owner) {
            return Ok(None);
        }
        Ok(state.data.get(&owner).cloned())
    }

    async fn discard(&self, owner: Snowflake, path: &str) -> Result<(), ClaimError> {
        let mut state = self.state.lock();
        if state.data.get(&owner).map(String::as_str) == Some(path) {
            state.data.remove(&owner);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<HashSet<String>>,
    counter: Mutex<u64>,
}

impl MemoryBlobs {
    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(&self, filename: &str, _bytes: Vec<u8>) -> Result<String, BlobError> {
        let n = {
            let mut counter = self.counter.lock();
            *counter += 1;
            *counter
        };
        let path = format!("chat-images/{n}-{filename}");
        self.blobs.lock().insert(path.clone());
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.blobs.lock().remove(path);
        Ok(())
    }
}

// ============================================================================
// Sockets
// ============================================================================

enum SinkEvent {
    Text(String),
    Closed,
}

struct ChannelSink(mpsc::UnboundedSender<SinkEvent>);

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        self.0
            .send(SinkEvent::Text(text))
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let _ = self.0.send(SinkEvent::Closed);
        Ok(())
    }
}

/// The client end of a connected session.
pub struct TestClient {
    pub session: Arc<Session>,
    rx: mpsc::UnboundedReceiver<SinkEvent>,
}

impl TestClient {
    /// Next JSON frame, skipping nothing. Panics on timeout or close.
    pub async fn next_frame(&mut self) -> serde_json::Value {
        match timeout(FRAME_WAIT, self.rx.recv()).await {
            Ok(Some(SinkEvent::Text(text))) => serde_json::from_str(&text).unwrap(),
            Ok(Some(SinkEvent::Closed)) => panic!("connection closed while waiting for a frame"),
            Ok(None) => panic!("sink dropped"),
            Err(_) => panic!("no frame within {FRAME_WAIT:?}"),
        }
    }

    /// Whether the server closed this connection, waiting briefly.
    pub async fn was_closed(&mut self) -> bool {
        loop {
            match timeout(FRAME_WAIT, self.rx.recv()).await {
                Ok(Some(SinkEvent::Closed)) => return true,
                Ok(Some(SinkEvent::Text(_))) => continue,
                Ok(None) | Err(_) => return false,
            }
        }
    }

    /// Assert nothing arrives for a short while.
    pub async fn assert_silent(&mut self) {
        if let Ok(Some(SinkEvent::Text(text))) =
            timeout(Duration::from_millis(100), self.rx.recv()).await
        {
            panic!("unexpected frame: {text}");
        }
    }
}

// ============================================================================
// Gateway fixture
// ============================================================================

pub struct TestGateway {
    pub store: Arc<MemoryStore>,
    pub claims: Arc<MemoryClaims>,
    pub blobs: Arc<MemoryBlobs>,
    pub registry: Arc<ConnectionRegistry>,
    pub attachments: Arc<AttachmentService>,
    pub pipeline: MessagePipeline,
}

impl TestGateway {
    /// Alice, Bob and Carol exist; Alice and Bob share conversation 500.
    pub fn new() -> Self {
        Self::with_limits(100.0, 100)
    }

    pub fn with_limits(refill_per_sec: f64, burst: u32) -> Self {
        let store = Arc::new(MemoryStore::default());
        store.add_user(ALICE, "alice");
        store.add_user(BOB, "bob");
        store.add_user(CAROL, "carol");
        store.add_conversation(Self::CONVERSATION, ALICE, BOB);

        let claims = Arc::new(MemoryClaims::default());
        let blobs = Arc::new(MemoryBlobs::default());
        let background = BackgroundTasks::new(16);
        let registry = Arc::new(ConnectionRegistry::new(Duration::from_secs(1)));

        let attachments = Arc::new(AttachmentService::new(
            claims.clone(),
            blobs.clone(),
            background.clone(),
        ));
        let messages = Arc::new(MessageServiceImpl::new(
            store.clone(),
            store.clone(),
            Arc::new(SnowflakeGenerator::new(1)),
            background,
        ));
        let pipeline = MessagePipeline::new(
            Arc::new(RateLimiter::new(refill_per_sec, burst)),
            attachments.clone(),
            messages,
            registry.clone(),
        );

        Self {
            store,
            claims,
            blobs,
            registry,
            attachments,
            pipeline,
        }
    }

    pub const CONVERSATION: Snowflake = Snowflake(500);

    /// Register a session and load its participants, like the socket
    /// handler does before announcing the user online.
    pub async fn connect(&self, user: Snowflake) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.registry.connect(user, Box::new(ChannelSink(tx)));
        session
            .load_participants(self.store.as_ref())
            .await
            .unwrap();
        self.registry
            .notify_status(&session.participants_snapshot(), user, true);
        TestClient { session, rx }
    }

    /// Send one text frame from `client` through the pipeline.
    pub async fn send(&self, client: &TestClient, frame: serde_json::Value) {
        self.pipeline
            .handle_text(&client.session, "192.0.2.1", &frame.to_string())
            .await
            .unwrap();
    }
}

/// Poll `condition` until it holds, for up to a second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// A well-formed message frame.
pub fn message_frame(id: &str, conversation: Snowflake, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": "msg",
        "conversationId": conversation.to_string(),
        "message": text,
    })
}
