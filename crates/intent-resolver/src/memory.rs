//! Session context store - bounded per-session conversation history plus the
//! carried-over query id and parameters that make follow-up questions work.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Parameter name to value, as produced by the decision source and the resolver
pub type Params = serde_json::Map<String, serde_json::Value>;

pub const DEFAULT_MAX_HISTORY_TURNS: usize = 25;
pub const MAX_DATA_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub query_id: Option<String>,
    #[serde(default)]
    pub params: Params,
    pub summary: Option<String>,
    pub data_preview: Option<Vec<serde_json::Value>>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            query_id: None,
            params: Params::new(),
            summary: None,
            data_preview: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_query(mut self, query_id: impl Into<String>, params: Params) -> Self {
        self.query_id = Some(query_id.into());
        self.params = params;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Attach the first rows of a result set; anything past five rows is dropped.
    pub fn with_data_preview(mut self, mut rows: Vec<serde_json::Value>) -> Self {
        rows.truncate(MAX_DATA_PREVIEW_ROWS);
        self.data_preview = Some(rows);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub history: VecDeque<ConversationTurn>,
    pub last_params: Params,
    pub last_query_id: Option<String>,
    max_history: usize,
    last_accessed: Instant,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_TURNS)
    }
}

impl SessionContext {
    pub fn new(max_history: usize) -> Self {
        Self {
            history: VecDeque::new(),
            last_params: Params::new(),
            last_query_id: None,
            max_history: max_history.max(1),
            last_accessed: Instant::now(),
        }
    }

    /// Push a turn, evicting the oldest beyond the bound, and fold its
    /// parameters into `last_params` (last write wins per key).
    pub fn add_turn(&mut self, turn: ConversationTurn) {
        for (name, value) in &turn.params {
            self.last_params.insert(name.clone(), value.clone());
        }
        if let Some(query_id) = &turn.query_id {
            self.last_query_id = Some(query_id.clone());
        }

        self.history.push_back(turn);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn has_prior_query(&self) -> bool {
        self.last_query_id.is_some()
    }

    pub fn recent_turns(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        self.history.iter().skip(self.history.len().saturating_sub(n))
    }

    pub fn idle_for(&self) -> Duration {
        self.last_accessed.elapsed()
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

pub trait SessionStore: Send + Sync {
    /// Snapshot of the session, created empty on first use
    fn get_or_create(&self, session_id: &str) -> SessionContext;
    fn append_turn(&self, session_id: &str, turn: ConversationTurn);
    fn clear(&self, session_id: &str);
    /// Drop sessions idle past the store's TTL; returns how many were dropped
    fn evict_idle(&self) -> usize {
        0
    }
}

/// Process-local store. Each session sits behind its own mutex so writes to one
/// session serialize while different sessions never contend beyond a map shard.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, Arc<Mutex<SessionContext>>>>,
    max_history: usize,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new(max_history: usize, ttl: Option<Duration>) -> Self {
        info!(
            "Session store initialized (history {} turns, ttl {:?})",
            max_history, ttl
        );
        Self {
            sessions: Arc::new(DashMap::new()),
            max_history,
            ttl,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn handle(&self, session_id: &str) -> Arc<Mutex<SessionContext>> {
        // clone the Arc so the shard guard is released before the session lock is taken
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!("Creating session context for {}", session_id);
                Arc::new(Mutex::new(SessionContext::new(self.max_history)))
            })
            .clone()
    }

    /// Whether `handle` is still the map's entry for the session
    fn is_current(&self, session_id: &str, handle: &Arc<Mutex<SessionContext>>) -> bool {
        self.sessions
            .get(session_id)
            .map_or(false, |entry| Arc::ptr_eq(entry.value(), handle))
    }

    fn is_expired(&self, context: &SessionContext) -> bool {
        self.ttl.map_or(false, |ttl| context.idle_for() > ttl)
    }

    fn lock_fresh<'a>(&self, session_id: &str, handle: &'a Mutex<SessionContext>) -> MutexGuard<'a, SessionContext> {
        let mut context = lock(handle);
        if self.is_expired(&context) {
            debug!("Session {} expired, starting fresh", session_id);
            *context = SessionContext::new(self.max_history);
        }
        context.touch();
        context
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_TURNS, None)
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, session_id: &str) -> SessionContext {
        let handle = self.handle(session_id);
        let context = self.lock_fresh(session_id, &handle);
        context.clone()
    }

    fn append_turn(&self, session_id: &str, turn: ConversationTurn) {
        loop {
            let handle = self.handle(session_id);
            let mut context = self.lock_fresh(session_id, &handle);
            // an eviction between `handle` and the lock detaches this context
            if !self.is_current(session_id, &handle) {
                debug!("Session {} was evicted while appending, retrying", session_id);
                continue;
            }
            context.add_turn(turn);
            debug!(
                "Appended turn to session {} ({} turns, last query {:?})",
                session_id,
                context.history.len(),
                context.last_query_id
            );
            return;
        }
    }

    fn clear(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            debug!("Cleared session {}", session_id);
        }
    }

    fn evict_idle(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.sessions.len();
        // a session whose lock is held is in use, not idle
        self.sessions.retain(|_, handle| match handle.try_lock() {
            Ok(context) => context.idle_for() <= ttl,
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().idle_for() <= ttl,
        });
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }
}

fn lock(handle: &Mutex<SessionContext>) -> MutexGuard<'_, SessionContext> {
    // a panicked writer leaves a structurally valid context behind
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
