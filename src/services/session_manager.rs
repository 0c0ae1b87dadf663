// src/services/session_manager.rs
use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    task::JoinHandle,
};

#[derive(Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Bot,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    AskingTransactionForStatus,
    AskingTransactionForRefund,
    AskingRefundReason,
    ConfirmingRefund,
}

/// Slots collected while walking a payment flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionData {
    pub transaction_id: Option<String>,
    pub refund_reason: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub state: ConversationState,
    pub data: SessionData,
    pub last_active: Instant,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            state: ConversationState::default(),
            data: SessionData::default(),
            last_active: Instant::now(),
        }
    }

    /// Append to history and touch `last_active`. Returns the history length.
    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) -> usize {
        self.messages.push(Message {
            role,
            content: content.into(),
        });
        self.last_active = Instant::now();
        self.messages.len()
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Sessions keyed by id. Each session carries its own lock, so turns on
/// different sessions never wait on each other.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<DashMap<String, SessionHandle>>,
    ttl: Duration,
}

impl Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.ttl)
            .field("sessions", &self.inner.len())
            .finish()
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Handle for `id`, creating the session on first use.
    // The map guard is dropped before returning so callers may hold the
    // session lock across awaits.
    pub fn session(&self, id: &str) -> SessionHandle {
        if let Some(existing) = self.inner.get(id) {
            return existing.value().clone();
        }
        self.inner
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(id))))
            .value()
            .clone()
    }

    /// Lock the live session for `id`, creating it if needed.
    ///
    /// A handle removed from the map while we waited for its lock (by `end_session`
    /// or the sweeper) is discarded and a fresh session is locked instead.
    pub async fn lock_session(&self, id: &str) -> OwnedMutexGuard<Session> {
        loop {
            let handle = self.session(id);
            let guard = handle.clone().lock_owned().await;
            let live = self
                .inner
                .get(id)
                .is_some_and(|entry| Arc::ptr_eq(entry.value(), &handle));
            if live {
                return guard;
            }
            tracing::debug!(session_id = id, "session removed while waiting for its lock");
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    /// Remove a session, waiting for any in-flight turn. Returns its message count.
    pub async fn end_session(&self, session_id: &str) -> Option<usize> {
        let (_, handle) = self.inner.remove(session_id)?;
        let session = handle.lock().await;
        Some(session.messages.len())
    }

    /// Remove sessions idle longer than ttl. Returns number removed.
    /// A session locked by an in-flight turn counts as active.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, handle| match handle.try_lock() {
            Ok(session) => now.duration_since(session.last_active) < self.ttl,
            Err(_) => true,
        });
        before.saturating_sub(self.inner.len())
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Periodically purge idle sessions until the runtime shuts down.
pub fn spawn_session_sweeper(manager: SessionManager, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = manager.purge_expired();
            if removed > 0 {
                tracing::info!(removed, remaining = manager.len(), "purged idle sessions");
            }
        }
    })
}
