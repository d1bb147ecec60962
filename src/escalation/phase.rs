//! Phase calculation — pure mapping from (session, now) to a severity tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Session;

/// Escalation severity tiers, least to most severe. `Emergency` is never
/// derived from elapsed time; it is only reached through the manual trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPhase {
    SoftWarning,
    MediumAlert,
    CriticalAlert,
    LegalAlert,
    Emergency,
}

impl EscalationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SoftWarning => "soft_warning",
            Self::MediumAlert => "medium_alert",
            Self::CriticalAlert => "critical_alert",
            Self::LegalAlert => "legal_alert",
            Self::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for EscalationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minutes-overdue thresholds for each timed phase. Configuration, not
/// constants, so deployments can tune them per user or organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    pub soft_warning_minutes: u64,
    pub medium_alert_minutes: u64,
    pub critical_alert_minutes: u64,
    pub legal_alert_minutes: u64,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            soft_warning_minutes: 0,
            medium_alert_minutes: 15,
            critical_alert_minutes: 60,
            legal_alert_minutes: 1440,
        }
    }
}

/// Which phase a session is in at `now`, or `None` when no escalation is
/// due (terminal status, or the check-in timer has not expired).
///
/// Thresholds are evaluated highest-first so the most severe applicable
/// phase wins. Pure and deterministic: the scanner can be invoked
/// repeatedly and redundantly without drift.
pub fn calculate_phase(
    session: &Session,
    now: DateTime<Utc>,
    thresholds: &PhaseThresholds,
) -> Option<EscalationPhase> {
    if !session.is_active() {
        return None;
    }
    let minutes_overdue = session.minutes_overdue(now)?;

    if minutes_overdue >= thresholds.legal_alert_minutes as i64 {
        Some(EscalationPhase::LegalAlert)
    } else if minutes_overdue >= thresholds.critical_alert_minutes as i64 {
        Some(EscalationPhase::CriticalAlert)
    } else if minutes_overdue >= thresholds.medium_alert_minutes as i64 {
        Some(EscalationPhase::MediumAlert)
    } else if minutes_overdue >= thresholds.soft_warning_minutes as i64 {
        Some(EscalationPhase::SoftWarning)
    } else {
        None
    }
}

/// Point-in-time escalation summary for one session, for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationStatus {
    pub phase: Option<EscalationPhase>,
    pub minutes_overdue: Option<i64>,
    pub minutes_until_next_phase: Option<i64>,
}

pub fn escalation_status(
    session: &Session,
    now: DateTime<Utc>,
    thresholds: &PhaseThresholds,
) -> EscalationStatus {
    EscalationStatus {
        phase: calculate_phase(session, now, thresholds),
        minutes_overdue: session.minutes_overdue(now),
        minutes_until_next_phase: minutes_until_next_phase(session, now, thresholds),
    }
}

/// Minutes until the session crosses into the next, more severe phase.
/// `None` when no escalation is active or the session is already at the
/// most severe timed phase.
pub fn minutes_until_next_phase(
    session: &Session,
    now: DateTime<Utc>,
    thresholds: &PhaseThresholds,
) -> Option<i64> {
    let phase = calculate_phase(session, now, thresholds)?;
    let minutes_overdue = session.minutes_overdue(now)?;

    let next_threshold = match phase {
        EscalationPhase::SoftWarning => thresholds.medium_alert_minutes,
        EscalationPhase::MediumAlert => thresholds.critical_alert_minutes,
        EscalationPhase::CriticalAlert => thresholds.legal_alert_minutes,
        EscalationPhase::LegalAlert | EscalationPhase::Emergency => return None,
    };
    Some(next_threshold as i64 - minutes_overdue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProtectionLevel, SessionStatus};
    use chrono::Duration;

    fn overdue_session(now: DateTime<Utc>) -> Session {
        // Interval 60 → next_check_in_due is start + 60m.
        Session::new("user-1", ProtectionLevel::Short, "", 60, 480, now)
    }

    #[test]
    fn non_active_sessions_never_escalate() {
        let start = Utc::now();
        let thresholds = PhaseThresholds::default();
        for status in [
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::Emergency,
            SessionStatus::Escalated,
        ] {
            let mut session = overdue_session(start);
            session.status = status;
            // A week overdue, but terminal.
            let now = start + Duration::days(7);
            assert_eq!(calculate_phase(&session, now, &thresholds), None);
        }
    }

    #[test]
    fn not_yet_due_is_none() {
        let start = Utc::now();
        let session = overdue_session(start);
        let thresholds = PhaseThresholds::default();
        assert_eq!(
            calculate_phase(&session, start + Duration::minutes(59), &thresholds),
            None
        );
    }

    #[test]
    fn phase_boundaries_are_exact() {
        let start = Utc::now();
        let session = overdue_session(start);
        let thresholds = PhaseThresholds::default();
        let due = session.next_check_in_due;

        // Exactly at the due instant: 0 minutes overdue → soft warning.
        assert_eq!(
            calculate_phase(&session, due, &thresholds),
            Some(EscalationPhase::SoftWarning)
        );
        // 14m59s overdue is still soft.
        assert_eq!(
            calculate_phase(
                &session,
                due + Duration::minutes(14) + Duration::seconds(59),
                &thresholds
            ),
            Some(EscalationPhase::SoftWarning)
        );
        assert_eq!(
            calculate_phase(&session, due + Duration::minutes(15), &thresholds),
            Some(EscalationPhase::MediumAlert)
        );
        // Just under 60 minutes overdue is not critical.
        assert_eq!(
            calculate_phase(
                &session,
                due + Duration::minutes(59) + Duration::seconds(59) + Duration::milliseconds(999),
                &thresholds
            ),
            Some(EscalationPhase::MediumAlert)
        );
        assert_eq!(
            calculate_phase(&session, due + Duration::minutes(60), &thresholds),
            Some(EscalationPhase::CriticalAlert)
        );
        assert_eq!(
            calculate_phase(&session, due + Duration::minutes(1439), &thresholds),
            Some(EscalationPhase::CriticalAlert)
        );
        assert_eq!(
            calculate_phase(&session, due + Duration::minutes(1440), &thresholds),
            Some(EscalationPhase::LegalAlert)
        );
        // Severity saturates at legal for timed escalation.
        assert_eq!(
            calculate_phase(&session, due + Duration::days(30), &thresholds),
            Some(EscalationPhase::LegalAlert)
        );
    }

    #[test]
    fn custom_thresholds_shift_the_ladder() {
        let start = Utc::now();
        let session = overdue_session(start);
        let thresholds = PhaseThresholds {
            soft_warning_minutes: 0,
            medium_alert_minutes: 5,
            critical_alert_minutes: 10,
            legal_alert_minutes: 20,
        };
        let due = session.next_check_in_due;
        assert_eq!(
            calculate_phase(&session, due + Duration::minutes(12), &thresholds),
            Some(EscalationPhase::CriticalAlert)
        );
        assert_eq!(
            calculate_phase(&session, due + Duration::minutes(20), &thresholds),
            Some(EscalationPhase::LegalAlert)
        );
    }

    #[test]
    fn time_until_next_phase_counts_down() {
        let start = Utc::now();
        let session = overdue_session(start);
        let thresholds = PhaseThresholds::default();
        let due = session.next_check_in_due;

        assert_eq!(
            minutes_until_next_phase(&session, due + Duration::minutes(5), &thresholds),
            Some(10)
        );
        assert_eq!(
            minutes_until_next_phase(&session, due + Duration::minutes(61), &thresholds),
            Some(1379)
        );
        // At the max timed phase there is no next phase.
        assert_eq!(
            minutes_until_next_phase(&session, due + Duration::minutes(1500), &thresholds),
            None
        );
        // Not overdue at all.
        assert_eq!(minutes_until_next_phase(&session, start, &thresholds), None);
    }

    #[test]
    fn status_summary_combines_the_three_views() {
        let start = Utc::now();
        let session = overdue_session(start);
        let thresholds = PhaseThresholds::default();
        let due = session.next_check_in_due;

        let status = escalation_status(&session, due + Duration::minutes(20), &thresholds);
        assert_eq!(status.phase, Some(EscalationPhase::MediumAlert));
        assert_eq!(status.minutes_overdue, Some(20));
        assert_eq!(status.minutes_until_next_phase, Some(40));

        let quiet = escalation_status(&session, start, &thresholds);
        assert_eq!(quiet.phase, None);
        assert_eq!(quiet.minutes_overdue, None);
    }
}
