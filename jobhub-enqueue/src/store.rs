//! Store abstraction and the in-memory implementation.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Failures reported by a [`JobStore`] or one of its sessions.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection unavailable: {0}")]
    Connection(String),

    #[error("store command failed: {0}")]
    Command(String),
}

/// Source of short-lived store sessions.
///
/// Implementations are shared process-wide (typically a pool handle). The engine
/// acquires exactly one session per enqueue call and drops it before returning.
#[async_trait]
pub trait JobStore: Send + Sync {
    type Session: StoreSession;

    async fn acquire(&self) -> Result<Self::Session, StoreError>;
}

/// One borrowed connection. Dropping it releases the connection.
#[async_trait]
pub trait StoreSession: Send {
    /// Idempotently add `member` to the set at `key`.
    async fn add_to_set(&mut self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Append `payload` to the tail of the list at `key`.
    async fn push_to_list(&mut self, key: &str, payload: &[u8]) -> Result<(), StoreError>;

    /// Add `payload` to the sorted set at `key` with the given score.
    async fn add_to_sorted_set(
        &mut self,
        key: &str,
        score: f64,
        payload: &[u8],
    ) -> Result<(), StoreError>;
}

/// A sorted-set member with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub score: f64,
    pub member: Vec<u8>,
}

impl ScoredMember {
    /// Score first, then lexicographic on the member bytes.
    fn cmp_rank(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.cmp(&other.member))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    sorted_sets: HashMap<String, Vec<ScoredMember>>,
}

impl MemoryState {
    fn zadd(&mut self, key: &str, score: f64, member: &[u8]) {
        let entries = self.sorted_sets.entry(key.to_owned()).or_default();
        // Re-adding an existing member only updates its score.
        entries.retain(|e| e.member != member);
        let entry = ScoredMember {
            score,
            member: member.to_vec(),
        };
        let pos = entries
            .binary_search_by(|probe| probe.cmp_rank(&entry))
            .unwrap_or_else(|pos| pos);
        entries.insert(pos, entry);
    }
}

/// Process-local store with Redis-like set, list and sorted-set semantics.
///
/// Useful for tests and for embedding the engine without a server. Cloning
/// shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    open_sessions: Arc<AtomicUsize>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("state", &"<RwLock<MemoryState>>")
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions acquired and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(AtomicOrdering::SeqCst)
    }

    pub async fn set_members(&self, key: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .sets
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn is_member(&self, key: &str, member: &str) -> bool {
        let state = self.state.read().await;
        state.sets.get(key).is_some_and(|m| m.contains(member))
    }

    pub async fn list_len(&self, key: &str) -> usize {
        let state = self.state.read().await;
        state.lists.get(key).map_or(0, VecDeque::len)
    }

    /// All list entries, head first.
    pub async fn list_range(&self, key: &str) -> Vec<Vec<u8>> {
        let state = self.state.read().await;
        state
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return the head of the list, as a consumer would.
    pub async fn pop_front(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.state.write().await;
        state.lists.get_mut(key).and_then(VecDeque::pop_front)
    }

    pub async fn sorted_set_len(&self, key: &str) -> usize {
        let state = self.state.read().await;
        state.sorted_sets.get(key).map_or(0, Vec::len)
    }

    /// All sorted-set members in rank order.
    pub async fn sorted_set_range(&self, key: &str) -> Vec<ScoredMember> {
        let state = self.state.read().await;
        state.sorted_sets.get(key).cloned().unwrap_or_default()
    }

    /// Drop every key.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.sets.clear();
        state.lists.clear();
        state.sorted_sets.clear();
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    type Session = MemorySession;

    async fn acquire(&self) -> Result<Self::Session, StoreError> {
        self.open_sessions.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(MemorySession {
            state: Arc::clone(&self.state),
            open_sessions: Arc::clone(&self.open_sessions),
        })
    }
}

/// Session handed out by [`MemoryStore`].
pub struct MemorySession {
    state: Arc<RwLock<MemoryState>>,
    open_sessions: Arc<AtomicUsize>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn add_to_set(&mut self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .sets
            .entry(key.to_owned())
            .or_default()
            .insert(member.to_owned());
        Ok(())
    }

    async fn push_to_list(&mut self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .lists
            .entry(key.to_owned())
            .or_default()
            .push_back(payload.to_vec());
        Ok(())
    }

    async fn add_to_sorted_set(
        &mut self,
        key: &str,
        score: f64,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        if score.is_nan() {
            return Err(StoreError::Command("sorted set score is not a number".into()));
        }
        let mut state = self.state.write().await;
        state.zadd(key, score, payload);
        Ok(())
    }
}
