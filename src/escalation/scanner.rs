//! Session scanner — the periodic driver and the manual trigger surface.
//!
//! An external scheduler invokes [`SessionScanner::run_scan`] on a fixed
//! interval (keep the cadence at or below the smallest threshold delta,
//! e.g. every 5 minutes). Each invocation is one bounded unit of work; no
//! background threads are held between invocations.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::escalation::executor::{EscalationExecutor, ExecutionResult};
use crate::escalation::ledger::{EscalationLedger, EscalationRecord, EscalationTrigger};
use crate::escalation::phase::{calculate_phase, EscalationPhase};
use crate::model::{LocationData, Session, SessionStatus};
use crate::store::SessionStore;

/// Aggregate result of one scan invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Active sessions fetched.
    pub checked: usize,
    /// Sessions that had a phase executed this scan.
    pub escalated: usize,
    /// Executions per phase.
    pub phases: BTreeMap<EscalationPhase, u32>,
    /// Per-session failures; the scan continued past each of them.
    pub errors: Vec<String>,
    /// Whether the scan deadline cut the run short. Remaining sessions are
    /// picked up by the next scan.
    pub deadline_hit: bool,
}

/// Result of checking a single session, as returned by the manual trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub status: SessionStatus,
    /// Computed phase, if any.
    pub phase: Option<EscalationPhase>,
    /// Whether the phase was executed this invocation.
    pub escalated: bool,
    /// Phase was due but already recorded by an earlier scan.
    pub already_recorded: bool,
    pub result: Option<ExecutionResult>,
}

/// Drives calculate → dedup → execute → record across all active sessions.
pub struct SessionScanner {
    sessions: Arc<dyn SessionStore>,
    executor: EscalationExecutor,
    ledger: EscalationLedger,
    config: EngineConfig,
}

impl SessionScanner {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        executor: EscalationExecutor,
        ledger: EscalationLedger,
        config: EngineConfig,
    ) -> Self {
        Self {
            sessions,
            executor,
            ledger,
            config,
        }
    }

    /// Check every active session once. Per-session failures are collected
    /// into the summary; only a failure to query sessions at all, or an
    /// unconfigured notification service, propagates.
    pub async fn run_scan(&self, now: DateTime<Utc>) -> Result<ScanSummary, EngineError> {
        let started = tokio::time::Instant::now();
        let sessions = self.sessions.active_sessions().await?;

        let mut summary = ScanSummary {
            checked: sessions.len(),
            ..Default::default()
        };
        info!(checked = summary.checked, "scanning active sessions");

        for session in &sessions {
            if started.elapsed() >= self.config.scan_deadline() {
                warn!(
                    session_id = %session.session_id,
                    "scan deadline reached; leaving remaining sessions for the next scan"
                );
                summary.deadline_hit = true;
                break;
            }

            let outcome = tokio::time::timeout(
                self.config.session_timeout(),
                self.check_session(session, now, EscalationTrigger::MissedCheckIn),
            )
            .await;

            match outcome {
                Ok(Ok(outcome)) => {
                    if outcome.escalated {
                        summary.escalated += 1;
                        if let Some(phase) = outcome.phase {
                            *summary.phases.entry(phase).or_insert(0) += 1;
                        }
                    }
                }
                // Missing credentials fail every send; abort rather than
                // spinning through the rest of the sessions.
                Ok(Err(err @ EngineError::Configuration(_))) => {
                    error!(error = %err, "escalation path disabled; aborting scan");
                    return Err(err);
                }
                Ok(Err(err)) => {
                    error!(session_id = %session.session_id, error = %err, "session escalation failed");
                    summary
                        .errors
                        .push(format!("session {}: {err}", session.session_id));
                }
                Err(_) => {
                    error!(session_id = %session.session_id, "session escalation timed out");
                    summary.errors.push(format!(
                        "session {}: timed out after {:?}",
                        session.session_id,
                        self.config.session_timeout()
                    ));
                }
            }
        }

        info!(
            checked = summary.checked,
            escalated = summary.escalated,
            errors = summary.errors.len(),
            "scan complete"
        );
        Ok(summary)
    }

    /// One scan iteration for a single session, on demand. Idempotent: the
    /// ledger suppresses phases that already ran.
    pub async fn trigger_for_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionOutcome, EngineError> {
        let session = self
            .sessions
            .session(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        self.check_session(&session, now, EscalationTrigger::Manual)
            .await
    }

    /// Unconditional emergency broadcast. Bypasses phase computation and
    /// deduplication entirely: every press of the emergency control is
    /// intentional and executes in full. The ledger still receives an
    /// audit record (first press wins the slot; later presses are logged
    /// but never suppressed).
    pub async fn trigger_emergency(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        location: Option<LocationData>,
    ) -> Result<ExecutionResult, EngineError> {
        let session = match session_id {
            Some(id) => match self.sessions.session(id).await {
                Ok(found) => {
                    if found.is_none() {
                        warn!(session_id = id, "emergency trigger for unknown session; broadcasting anyway");
                    }
                    found
                }
                Err(err) => {
                    warn!(session_id = id, error = %err, "could not fetch session for emergency; broadcasting anyway");
                    None
                }
            },
            None => None,
        };

        let result = self
            .executor
            .execute_emergency(user_id, session.as_ref(), location)
            .await?;

        let record_session_id = session
            .as_ref()
            .map(|s| s.session_id.clone())
            .unwrap_or_else(|| format!("user:{user_id}"));
        self.ledger
            .record(EscalationRecord::new(
                record_session_id,
                user_id,
                EscalationPhase::Emergency,
                EscalationTrigger::EmergencyButton,
                result.clone(),
            ))
            .await;
        Ok(result)
    }

    async fn check_session(
        &self,
        session: &Session,
        now: DateTime<Utc>,
        trigger: EscalationTrigger,
    ) -> Result<SessionOutcome, EngineError> {
        let mut outcome = SessionOutcome {
            session_id: session.session_id.clone(),
            status: session.status,
            phase: None,
            escalated: false,
            already_recorded: false,
            result: None,
        };

        let Some(phase) = calculate_phase(session, now, &self.config.thresholds) else {
            debug!(session_id = %session.session_id, "no escalation due");
            return Ok(outcome);
        };
        outcome.phase = Some(phase);

        if self.ledger.has_escalated(&session.session_id, phase).await {
            debug!(session_id = %session.session_id, %phase, "already escalated to this phase");
            outcome.already_recorded = true;
            return Ok(outcome);
        }

        let result = self.executor.execute_phase(session, phase).await?;
        self.ledger
            .record(EscalationRecord::new(
                &session.session_id,
                &session.user_id,
                phase,
                trigger,
                result.clone(),
            ))
            .await;

        // The legal alert is the top of the timed ladder; the session is
        // then moved out of the scanner's working set. Conditional on the
        // status still being `active` so a concurrent check-in or cancel
        // is not resurrected into an escalation.
        if phase == EscalationPhase::LegalAlert {
            match self.sessions.mark_escalated(&session.session_id).await {
                Ok(true) => {
                    info!(session_id = %session.session_id, "session marked escalated");
                    outcome.status = SessionStatus::Escalated;
                }
                Ok(false) => {
                    debug!(session_id = %session.session_id, "status changed mid-escalation; leaving as-is")
                }
                Err(err) => {
                    warn!(session_id = %session.session_id, error = %err, "failed to mark session escalated")
                }
            }
        }

        outcome.escalated = true;
        outcome.result = Some(result);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::executor::EscalationExecutor;
    use crate::escalation::ledger::EscalationLedger;
    use crate::model::{EmergencyContact, ProtectionLevel, UserProfile};
    use crate::notify::pacing::FixedDelayPacer;
    use crate::notify::{DeliveryReceipt, NotificationRequest, Notifier, NotifyError};
    use crate::store::memory::{MemoryEscalationStore, MemoryProfileStore, MemorySessionStore};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Sleeps before delivering. With no filter every send is delayed;
    /// with one, only the listed recipient emails are.
    struct DelayingNotifier {
        delay: Duration,
        only: Option<HashSet<String>>,
    }

    impl DelayingNotifier {
        fn all(delay: Duration) -> Self {
            Self { delay, only: None }
        }

        fn for_emails(delay: Duration, emails: &[&str]) -> Self {
            Self {
                delay,
                only: Some(emails.iter().map(|e| e.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl Notifier for DelayingNotifier {
        async fn send(
            &self,
            request: &NotificationRequest,
        ) -> Result<DeliveryReceipt, NotifyError> {
            let delayed = match &self.only {
                Some(emails) => emails.contains(&request.to_email),
                None => true,
            };
            if delayed {
                tokio::time::sleep(self.delay).await;
            }
            Ok(DeliveryReceipt { message_id: None })
        }
    }

    fn contact(name: &str) -> EmergencyContact {
        EmergencyContact {
            contact_id: name.to_string(),
            name: name.to_string(),
            relationship: "friend".into(),
            phone: "+1-555-0100".into(),
            email: Some(format!("{name}@example.com")),
            priority: 1,
            is_legal: false,
            organization: None,
            is_active: true,
        }
    }

    fn profile(user_id: &str, contact_name: &str) -> UserProfile {
        UserProfile {
            user_id: user_id.into(),
            email: format!("{user_id}@example.com"),
            full_name: None,
            emergency_contacts: vec![contact(contact_name)],
        }
    }

    /// A 60-minute session 61 minutes overdue at `now`, with a fixed id so
    /// scan order is deterministic.
    fn critical_session(id: &str, user_id: &str, now: DateTime<Utc>) -> Session {
        let mut session = Session::new(
            user_id,
            ProtectionLevel::Short,
            "downtown",
            60,
            480,
            now - ChronoDuration::minutes(121),
        );
        session.session_id = id.to_string();
        session
    }

    struct World {
        sessions: std::sync::Arc<MemorySessionStore>,
        escalations: std::sync::Arc<MemoryEscalationStore>,
        scanner: SessionScanner,
    }

    async fn build_world(
        notifier: DelayingNotifier,
        config: EngineConfig,
        profiles_seed: &[(&str, &str)],
    ) -> World {
        let sessions = std::sync::Arc::new(MemorySessionStore::new());
        let profiles = std::sync::Arc::new(MemoryProfileStore::new());
        for (user_id, contact_name) in profiles_seed {
            profiles.insert(profile(user_id, contact_name)).await;
        }
        let escalations = std::sync::Arc::new(MemoryEscalationStore::new());
        let executor = EscalationExecutor::new(
            sessions.clone(),
            profiles,
            std::sync::Arc::new(notifier),
            std::sync::Arc::new(FixedDelayPacer::new(Duration::ZERO)),
        );
        let ledger = EscalationLedger::new(escalations.clone());
        let scanner = SessionScanner::new(sessions.clone(), executor, ledger, config);
        World {
            sessions,
            escalations,
            scanner,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scan_deadline_defers_remaining_sessions_to_the_next_scan() {
        let now = Utc::now();
        let config = EngineConfig {
            scan_deadline_secs: 1,
            session_timeout_secs: 600,
            ..Default::default()
        };
        // Every send sleeps past the deadline, so only the first session
        // fits into this scan.
        let w = build_world(
            DelayingNotifier::all(Duration::from_secs(2)),
            config,
            &[("user-1", "ada")],
        )
        .await;
        w.sessions.insert(critical_session("s-a", "user-1", now)).await;
        w.sessions.insert(critical_session("s-b", "user-1", now)).await;

        let summary = w.scanner.run_scan(now).await.unwrap();
        assert!(summary.deadline_hit);
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.escalated, 1);
        assert!(summary.errors.is_empty());

        // The deferred session is picked up by the next scan; the finished
        // one is suppressed by its ledger record.
        let summary = w
            .scanner
            .run_scan(now + ChronoDuration::minutes(1))
            .await
            .unwrap();
        assert_eq!(summary.escalated, 1);
        assert!(!summary.deadline_hit);
        assert_eq!(w.escalations.all().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn per_session_timeout_is_collected_and_the_scan_continues() {
        let now = Utc::now();
        let config = EngineConfig {
            session_timeout_secs: 1,
            scan_deadline_secs: 600,
            ..Default::default()
        };
        // Only user-1's contact hangs, well past the per-session bound.
        let w = build_world(
            DelayingNotifier::for_emails(Duration::from_secs(60), &["slow@example.com"]),
            config,
            &[("user-1", "slow"), ("user-2", "fast")],
        )
        .await;
        w.sessions.insert(critical_session("s-a", "user-1", now)).await;
        w.sessions.insert(critical_session("s-b", "user-2", now)).await;

        let summary = w.scanner.run_scan(now).await.unwrap();
        assert_eq!(summary.escalated, 1);
        assert!(!summary.deadline_hit);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("s-a"));
        assert!(summary.errors[0].contains("timed out"));

        // The timed-out session has no ledger record and will be retried.
        let records = w.escalations.all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id, "s-b");
        assert_eq!(records[0].trigger, EscalationTrigger::MissedCheckIn);
    }

    #[tokio::test]
    async fn manual_check_records_manual_provenance() {
        let now = Utc::now();
        let w = build_world(
            DelayingNotifier::all(Duration::ZERO),
            EngineConfig::default(),
            &[("user-1", "ada")],
        )
        .await;
        w.sessions.insert(critical_session("s-a", "user-1", now)).await;

        let outcome = w.scanner.trigger_for_session("s-a", now).await.unwrap();
        assert!(outcome.escalated);

        let records = w.escalations.all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].trigger, EscalationTrigger::Manual);
    }
}
