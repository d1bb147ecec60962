//! Record-store collaborator seams.
//!
//! Persistence is external to the engine; these traits expose exactly the
//! reads and conditional writes the escalation path needs. The in-memory
//! implementations in [`memory`] back the CLI fixture mode and the tests.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::escalation::ledger::EscalationRecord;
use crate::escalation::phase::EscalationPhase;
use crate::model::{CheckIn, Session, SessionStatus, UserProfile};

/// Error type for record-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for record-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Session records: the scanner's query surface plus the conditional
/// transitions that race with owner check-ins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All sessions with status `active`. Overdue filtering happens
    /// client-side in the phase calculator, since thresholds are
    /// configuration-dependent.
    async fn active_sessions(&self) -> StoreResult<Vec<Session>>;

    async fn session(&self, session_id: &str) -> StoreResult<Option<Session>>;

    /// Append a check-in and advance the due marker. Returns the updated
    /// session.
    async fn record_check_in(&self, session_id: &str, check_in: CheckIn) -> StoreResult<Session>;

    /// Force the session to a terminal status. A session that is already
    /// terminal is left as-is (last writer wins on the terminal state).
    async fn end_session(&self, session_id: &str, status: SessionStatus) -> StoreResult<()>;

    /// Transition to `escalated` only if the session is still `active`.
    /// Returns `false` when the status changed underneath us (the accepted
    /// race with an owner check-in or cancel).
    async fn mark_escalated(&self, session_id: &str) -> StoreResult<bool>;
}

/// Escalation records: the append-only audit trail that doubles as the
/// dedup marker for (session, phase).
#[async_trait]
pub trait EscalationRecordStore: Send + Sync {
    async fn find(
        &self,
        session_id: &str,
        phase: EscalationPhase,
    ) -> StoreResult<Option<EscalationRecord>>;

    /// Conditional create-if-absent on (session_id, phase). Returns `false`
    /// when a record already existed; this is the sole concurrency-control
    /// point between concurrent scans.
    async fn create(&self, record: EscalationRecord) -> StoreResult<bool>;
}

/// User/contact profiles, read-only from the engine's perspective.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn user_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;
}
