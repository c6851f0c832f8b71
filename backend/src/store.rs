//! Injected state store for sessions and request nonces.
//!
//! Every method is a single atomic step against the backing store. In particular
//! [`Store::insert_nonce`] is check-and-insert in one operation, so two concurrent
//! submissions carrying the same request id cannot both be admitted.

use crate::errors::ApiError;
use crate::models::SessionRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new session. Returns `false` if the id is already taken.
    async fn put_session(&self, record: SessionRecord) -> Result<bool, ApiError>;

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, ApiError>;

    /// Returns whether a record was removed.
    async fn delete_session(&self, id: &str) -> Result<bool, ApiError>;

    /// Drop every session with `expires_at <= now_ms`. Returns the number removed.
    async fn sweep_sessions(&self, now_ms: i64) -> Result<usize, ApiError>;

    /// Record `request_id` if it has never been seen. Returns `false` if it was already present.
    async fn insert_nonce(&self, request_id: &str, seen_at_ms: i64) -> Result<bool, ApiError>;

    /// Drop every nonce first seen before `cutoff_ms`. Returns the number removed.
    async fn sweep_nonces(&self, cutoff_ms: i64) -> Result<usize, ApiError>;
}

/// In-process store. One mutex per map; no await happens while a lock is held.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    nonces: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn nonce_count(&self) -> usize {
        self.nonces.lock().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_session(&self, record: SessionRecord) -> Result<bool, ApiError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&record.id) {
            return Ok(false);
        }
        sessions.insert(record.id.clone(), record);
        Ok(true)
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, ApiError> {
        Ok(self.sessions.lock().await.get(id).cloned())
    }

    async fn delete_session(&self, id: &str) -> Result<bool, ApiError> {
        Ok(self.sessions.lock().await.remove(id).is_some())
    }

    async fn sweep_sessions(&self, now_ms: i64) -> Result<usize, ApiError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.is_live(now_ms));
        Ok(before - sessions.len())
    }

    async fn insert_nonce(&self, request_id: &str, seen_at_ms: i64) -> Result<bool, ApiError> {
        let mut nonces = self.nonces.lock().await;
        if nonces.contains_key(request_id) {
            return Ok(false);
        }
        nonces.insert(request_id.to_string(), seen_at_ms);
        Ok(true)
    }

    async fn sweep_nonces(&self, cutoff_ms: i64) -> Result<usize, ApiError> {
        let mut nonces = self.nonces.lock().await;
        let before = nonces.len();
        nonces.retain(|_, seen_at| *seen_at >= cutoff_ms);
        Ok(before - nonces.len())
    }
}
