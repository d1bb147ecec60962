//! Escalation executor — per-phase notification side effects.
//!
//! Owns recipient fan-out, send pacing, and per-recipient result
//! aggregation. Delivery failures are recorded, never raised; the only
//! propagating failures are a missing owner profile (no recipient list can
//! exist) and an unconfigured notification service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::escalation::phase::EscalationPhase;
use crate::model::{EmergencyContact, LocationData, Session, SessionStatus, UserProfile};
use crate::notify::pacing::SendPacer;
use crate::notify::{AlertContext, NotificationRequest, Notifier, NotifyError, RecipientRole};
use crate::store::{ProfileStore, SessionStore, StoreError};

/// Advice returned when an emergency broadcast reached nobody.
pub const EMERGENCY_FALLBACK_ADVICE: &str =
    "No emergency notifications could be delivered. Contact emergency services (911) directly.";

/// Delivery channel used for a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
}

/// Outcome of one notification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub name: String,
    pub email: Option<String>,
    pub channel: Channel,
    pub success: bool,
    pub error: Option<String>,
}

impl RecipientOutcome {
    fn delivered(name: &str, email: Option<String>, channel: Channel) -> Self {
        Self {
            name: name.to_string(),
            email,
            channel,
            success: true,
            error: None,
        }
    }

    fn failed(name: &str, email: Option<String>, channel: Channel, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            email,
            channel,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Per-recipient breakdown of one executed phase. Returned by the manual
/// trigger surface so a caller can confirm exactly which contact
/// categories were reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub phase: EscalationPhase,
    pub owner: Option<RecipientOutcome>,
    pub emergency_contacts: Vec<RecipientOutcome>,
    pub legal_contacts: Vec<RecipientOutcome>,
    pub errors: Vec<String>,
    pub fallback_advice: Option<String>,
}

impl ExecutionResult {
    pub fn new(phase: EscalationPhase) -> Self {
        Self {
            phase,
            owner: None,
            emergency_contacts: Vec::new(),
            legal_contacts: Vec::new(),
            errors: Vec::new(),
            fallback_advice: None,
        }
    }

    fn outcomes(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.owner
            .iter()
            .chain(&self.emergency_contacts)
            .chain(&self.legal_contacts)
    }

    /// Total recipients attempted.
    pub fn attempted(&self) -> usize {
        self.outcomes().count()
    }

    /// Recipients successfully reached.
    pub fn delivered(&self) -> usize {
        self.outcomes().filter(|o| o.success).count()
    }

    pub fn any_delivered(&self) -> bool {
        self.outcomes().any(|o| o.success)
    }

    /// Mirror per-recipient failures into the flat error list.
    fn note_failures(&mut self) {
        let failures: Vec<String> = self
            .outcomes()
            .filter(|o| !o.success)
            .map(|o| {
                format!(
                    "failed to notify {}: {}",
                    o.name,
                    o.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        self.errors.extend(failures);
    }
}

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes the notification side effects for one (session, phase) pair.
pub struct EscalationExecutor {
    sessions: Arc<dyn SessionStore>,
    profiles: Arc<dyn ProfileStore>,
    notifier: Arc<dyn Notifier>,
    pacer: Arc<dyn SendPacer>,
    send_timeout: Duration,
}

impl EscalationExecutor {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        profiles: Arc<dyn ProfileStore>,
        notifier: Arc<dyn Notifier>,
        pacer: Arc<dyn SendPacer>,
    ) -> Self {
        Self {
            sessions,
            profiles,
            notifier,
            pacer,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Bound each outbound send. A hung delivery call becomes a failed
    /// recipient outcome; the rest of the fan-out and the ledger write
    /// still run.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Execute the side effects for `phase` against `session`.
    pub async fn execute_phase(
        &self,
        session: &Session,
        phase: EscalationPhase,
    ) -> Result<ExecutionResult, EngineError> {
        info!(session_id = %session.session_id, %phase, "executing escalation phase");
        match phase {
            EscalationPhase::SoftWarning => {
                // In-app reminder only; no external recipients, best effort.
                let mut result = ExecutionResult::new(phase);
                result.owner = Some(RecipientOutcome::delivered("owner", None, Channel::InApp));
                Ok(result)
            }
            EscalationPhase::MediumAlert => {
                let profile = self.profile(&session.user_id).await?;
                let context = self.context(&profile, Some(session), None);
                let mut result = ExecutionResult::new(phase);
                result.owner = Some(self.notify_owner(&profile, phase, &context).await?);
                result.note_failures();
                Ok(result)
            }
            EscalationPhase::CriticalAlert => {
                let profile = self.profile(&session.user_id).await?;
                let context = self.context(&profile, Some(session), None);
                let mut result = ExecutionResult::new(phase);
                result.emergency_contacts = self
                    .fan_out(
                        profile.emergency_contacts(),
                        RecipientRole::EmergencyContact,
                        phase,
                        &context,
                    )
                    .await?;
                result.note_failures();
                Ok(result)
            }
            EscalationPhase::LegalAlert => {
                let profile = self.profile(&session.user_id).await?;
                let context = self.context(&profile, Some(session), None);
                let mut result = ExecutionResult::new(phase);
                result.legal_contacts = self
                    .fan_out(
                        profile.legal_contacts(),
                        RecipientRole::LegalContact,
                        phase,
                        &context,
                    )
                    .await?;
                result.note_failures();
                Ok(result)
            }
            EscalationPhase::Emergency => {
                self.execute_emergency(&session.user_id, Some(session), None)
                    .await
            }
        }
    }

    /// Unconditional emergency broadcast: owner, then all emergency
    /// contacts, then all legal contacts, then force-terminate the session.
    /// Invokable without a session (emergency button with none active) and
    /// never deduplicated upstream.
    pub async fn execute_emergency(
        &self,
        user_id: &str,
        session: Option<&Session>,
        location: Option<LocationData>,
    ) -> Result<ExecutionResult, EngineError> {
        let profile = self.profile(user_id).await?;
        let location = location.or_else(|| session.and_then(|s| s.location.clone()));
        let context = self.context(&profile, session, location);
        let mut result = ExecutionResult::new(EscalationPhase::Emergency);

        result.owner = Some(
            self.notify_owner(&profile, EscalationPhase::Emergency, &context)
                .await?,
        );
        result.emergency_contacts = self
            .fan_out(
                profile.emergency_contacts(),
                RecipientRole::EmergencyContact,
                EscalationPhase::Emergency,
                &context,
            )
            .await?;
        result.legal_contacts = self
            .fan_out(
                profile.legal_contacts(),
                RecipientRole::LegalContact,
                EscalationPhase::Emergency,
                &context,
            )
            .await?;

        // The notifications already sent stand regardless of whether this
        // status transition succeeds.
        if let Some(session) = session {
            match self
                .sessions
                .end_session(&session.session_id, SessionStatus::Emergency)
                .await
            {
                Ok(()) => {
                    info!(session_id = %session.session_id, "session force-terminated to emergency")
                }
                Err(StoreError::NotFound(_)) => {
                    warn!(session_id = %session.session_id, "session not found during emergency terminate")
                }
                Err(err) => {
                    warn!(session_id = %session.session_id, error = %err, "failed to force-terminate session")
                }
            }
        }

        result.note_failures();
        if !result.any_delivered() {
            result.fallback_advice = Some(EMERGENCY_FALLBACK_ADVICE.to_string());
        }
        Ok(result)
    }

    async fn profile(&self, user_id: &str) -> Result<UserProfile, EngineError> {
        self.profiles
            .user_profile(user_id)
            .await?
            .ok_or_else(|| EngineError::ProfileNotFound(user_id.to_string()))
    }

    fn context(
        &self,
        profile: &UserProfile,
        session: Option<&Session>,
        location: Option<LocationData>,
    ) -> AlertContext {
        let location = location.or_else(|| session.and_then(|s| s.location.clone()));
        AlertContext {
            user_name: profile.display_name().to_string(),
            user_email: profile.email.clone(),
            session: session.cloned(),
            location,
            triggered_at: Utc::now(),
        }
    }

    async fn notify_owner(
        &self,
        profile: &UserProfile,
        phase: EscalationPhase,
        context: &AlertContext,
    ) -> Result<RecipientOutcome, EngineError> {
        let request = NotificationRequest {
            to_email: profile.email.clone(),
            to_name: profile.display_name().to_string(),
            role: RecipientRole::Owner,
            phase,
            organization: None,
            context: context.clone(),
        };
        self.send_one(request).await
    }

    /// Notify one contact category sequentially, in stored list order, with
    /// the pacer's mandated gap between sends. One recipient's failure
    /// never blocks the rest.
    async fn fan_out(
        &self,
        contacts: Vec<&EmergencyContact>,
        role: RecipientRole,
        phase: EscalationPhase,
        context: &AlertContext,
    ) -> Result<Vec<RecipientOutcome>, EngineError> {
        let mut outcomes = Vec::with_capacity(contacts.len());
        for contact in contacts {
            let Some(email) = contact.email.clone() else {
                warn!(contact = %contact.name, %phase, "contact has no email on file");
                outcomes.push(RecipientOutcome::failed(
                    &contact.name,
                    None,
                    Channel::Email,
                    "no email on file",
                ));
                continue;
            };
            let request = NotificationRequest {
                to_email: email,
                to_name: contact.name.clone(),
                role,
                phase,
                organization: contact.organization.clone(),
                context: context.clone(),
            };
            outcomes.push(self.send_one(request).await?);
        }
        Ok(outcomes)
    }

    async fn send_one(
        &self,
        request: NotificationRequest,
    ) -> Result<RecipientOutcome, EngineError> {
        self.pacer.acquire().await;
        let name = request.to_name.clone();
        let email = request.to_email.clone();
        match tokio::time::timeout(self.send_timeout, self.notifier.send(&request)).await {
            Ok(Ok(_)) => {
                info!(to = %email, phase = %request.phase, "notification sent");
                Ok(RecipientOutcome::delivered(&name, Some(email), Channel::Email))
            }
            // Missing credentials disable the whole path; this is not a
            // per-recipient delivery failure.
            Ok(Err(NotifyError::NotConfigured(msg))) => Err(EngineError::Configuration(msg)),
            Ok(Err(err)) => {
                warn!(to = %email, phase = %request.phase, error = %err, "notification failed");
                Ok(RecipientOutcome::failed(
                    &name,
                    Some(email),
                    Channel::Email,
                    err.to_string(),
                ))
            }
            Err(_) => {
                warn!(to = %email, phase = %request.phase, "notification send timed out");
                Ok(RecipientOutcome::failed(
                    &name,
                    Some(email),
                    Channel::Email,
                    format!("send timed out after {:?}", self.send_timeout),
                ))
            }
        }
    }
}
