//! Error taxonomy for the escalation engine.
//!
//! Per-recipient delivery failures are *not* errors at this level — they are
//! recorded inside `ExecutionResult` and never abort a phase. The variants
//! here are the conditions that end a session's escalation attempt (or the
//! whole scan) early.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the executor, scanner, and trigger surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Outbound notification credentials are absent. The whole escalation
    /// path is disabled; callers must report this as service-unavailable
    /// rather than silently dropping escalations.
    #[error("notification service not configured: {0}")]
    Configuration(String),

    /// Owner profile missing when recipients are needed. Fatal for that
    /// session's escalation attempt; the scanner logs and moves on.
    #[error("user profile not found for user {0}")]
    ProfileNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Record-store failure. Only fatal when the scanner cannot query
    /// sessions at all; dedup-store failures fail open instead.
    #[error(transparent)]
    Store(#[from] StoreError),
}
