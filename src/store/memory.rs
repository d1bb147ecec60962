//! In-memory store implementations.
//!
//! Back the CLI fixture mode and the test suite. The conditional-write
//! semantics (create-if-absent escalation records, status CAS) match what a
//! production document store would provide.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EscalationRecordStore, ProfileStore, SessionStore, StoreError, StoreResult};
use crate::escalation::ledger::EscalationRecord;
use crate::escalation::phase::EscalationPhase;
use crate::model::{CheckIn, Session, SessionStatus, UserProfile};

/// Sessions keyed by id.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn active_sessions(&self) -> StoreResult<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut active: Vec<Session> = sessions
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect();
        // Stable iteration order keeps scan summaries reproducible.
        active.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(active)
    }

    async fn session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn record_check_in(&self, session_id: &str, check_in: CheckIn) -> StoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        session.apply_check_in(check_in);
        Ok(session.clone())
    }

    async fn end_session(&self, session_id: &str, status: SessionStatus) -> StoreResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        if session.status.is_terminal() {
            // Already ended; the notifications that led here stand regardless.
            return Ok(());
        }
        session.status = status;
        session.ended_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn mark_escalated(&self, session_id: &str) -> StoreResult<bool> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        if !session.is_active() {
            return Ok(false);
        }
        session.status = SessionStatus::Escalated;
        session.ended_at = Some(chrono::Utc::now());
        Ok(true)
    }
}

/// Escalation records keyed by (session_id, phase).
#[derive(Default)]
pub struct MemoryEscalationStore {
    records: RwLock<HashMap<(String, EscalationPhase), EscalationRecord>>,
}

impl MemoryEscalationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, for audit inspection in tests and the CLI.
    pub async fn all(&self) -> Vec<EscalationRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl EscalationRecordStore for MemoryEscalationStore {
    async fn find(
        &self,
        session_id: &str,
        phase: EscalationPhase,
    ) -> StoreResult<Option<EscalationRecord>> {
        let key = (session_id.to_string(), phase);
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn create(&self, record: EscalationRecord) -> StoreResult<bool> {
        let key = (record.session_id.clone(), record.phase);
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Ok(false);
        }
        records.insert(key, record);
        Ok(true)
    }
}

/// Profiles keyed by user id.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn user_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }
}
