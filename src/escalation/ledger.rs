//! Escalation ledger — the deduplicator.
//!
//! An [`EscalationRecord`] is created once per (session, phase) and is
//! immutable afterward: its absence is the signal that a phase has not yet
//! been executed. This is what makes the scanner safe to run every few
//! minutes indefinitely without re-notifying anyone.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::escalation::executor::ExecutionResult;
use crate::escalation::phase::EscalationPhase;
use crate::store::EscalationRecordStore;

/// What set the escalation in motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTrigger {
    MissedCheckIn,
    EmergencyButton,
    Manual,
}

impl std::fmt::Display for EscalationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissedCheckIn => write!(f, "missed_check_in"),
            Self::EmergencyButton => write!(f, "emergency_button"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Append-only audit record of one executed escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub escalation_id: String,
    pub session_id: String,
    pub user_id: String,
    pub phase: EscalationPhase,
    pub trigger: EscalationTrigger,
    pub executed_at: DateTime<Utc>,
    pub outcome: ExecutionResult,
}

impl EscalationRecord {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        phase: EscalationPhase,
        trigger: EscalationTrigger,
        outcome: ExecutionResult,
    ) -> Self {
        Self {
            escalation_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            phase,
            trigger,
            executed_at: Utc::now(),
            outcome,
        }
    }
}

/// Dedup gate over the escalation record store.
#[derive(Clone)]
pub struct EscalationLedger {
    store: Arc<dyn EscalationRecordStore>,
}

impl EscalationLedger {
    pub fn new(store: Arc<dyn EscalationRecordStore>) -> Self {
        Self { store }
    }

    /// Whether (session, phase) has already been executed.
    ///
    /// Fails open: if the store cannot be queried we proceed to escalate
    /// rather than silently skip a life-safety notification. The asymmetry
    /// is deliberate; a duplicate alert is recoverable, a dropped one may
    /// not be.
    pub async fn has_escalated(&self, session_id: &str, phase: EscalationPhase) -> bool {
        match self.store.find(session_id, phase).await {
            Ok(record) => record.is_some(),
            Err(err) => {
                warn!(
                    session_id,
                    %phase,
                    error = %err,
                    "dedup check failed; failing open and escalating"
                );
                false
            }
        }
    }

    /// Persist an executed escalation, even on partial delivery failure —
    /// an attempted phase must not be retried indefinitely once some
    /// recipients were reached. Write failures are logged as a correctness
    /// risk (the next scan may re-notify) but never raised.
    pub async fn record(&self, record: EscalationRecord) {
        let session_id = record.session_id.clone();
        let phase = record.phase;
        match self.store.create(record).await {
            Ok(true) => debug!(session_id, %phase, "escalation recorded"),
            Ok(false) => debug!(session_id, %phase, "escalation already recorded"),
            Err(err) => warn!(
                session_id,
                %phase,
                error = %err,
                "failed to record escalation; next scan may re-notify"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoreError, StoreResult};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl EscalationRecordStore for BrokenStore {
        async fn find(
            &self,
            _session_id: &str,
            _phase: EscalationPhase,
        ) -> StoreResult<Option<EscalationRecord>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn create(&self, _record: EscalationRecord) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn dedup_check_fails_open_on_store_error() {
        let ledger = EscalationLedger::new(Arc::new(BrokenStore));
        assert!(
            !ledger
                .has_escalated("session-1", EscalationPhase::CriticalAlert)
                .await,
            "a broken store must look un-escalated so the alert still goes out"
        );
    }

    #[tokio::test]
    async fn record_write_failure_is_swallowed() {
        let ledger = EscalationLedger::new(Arc::new(BrokenStore));
        // Must not panic or propagate.
        ledger
            .record(EscalationRecord::new(
                "session-1",
                "user-1",
                EscalationPhase::MediumAlert,
                EscalationTrigger::MissedCheckIn,
                ExecutionResult::new(EscalationPhase::MediumAlert),
            ))
            .await;
    }
}
