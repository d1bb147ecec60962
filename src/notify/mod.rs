//! Outbound notification collaborator.
//!
//! The executor talks to a [`Notifier`] once per (recipient, phase); the
//! escalation ledger upstream guarantees at-most-one call per pair across
//! scans. [`sendgrid::SendGridNotifier`] is the production implementation;
//! tests substitute recording doubles.

pub mod pacing;
pub mod sendgrid;
pub mod template;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::escalation::phase::EscalationPhase;
use crate::model::{LocationData, Session};

/// Errors from a notification send attempt.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Credentials absent — the escalation path is disabled, not degraded.
    #[error("notification service not configured: {0}")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("delivery rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Which relationship the recipient has to the session owner. Selects the
/// template family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientRole {
    Owner,
    EmergencyContact,
    LegalContact,
}

/// Session and location context baked into every template.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub user_name: String,
    pub user_email: String,
    pub session: Option<Session>,
    pub location: Option<LocationData>,
    pub triggered_at: DateTime<Utc>,
}

/// One structured send request: recipient, phase tag, and context.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub to_email: String,
    pub to_name: String,
    pub role: RecipientRole,
    pub phase: EscalationPhase,
    /// Organization name for legal recipients.
    pub organization: Option<String>,
    pub context: AlertContext,
}

/// Receipt for a delivered notification.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub message_id: Option<String>,
}

/// Transactional notification sender.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, NotifyError>;
}
