//! Escalation phase computation and execution.
//!
//! The pipeline, per session, per scan:
//!
//! ```text
//! Session ──▶ calculate_phase(session, now)      pure, deterministic
//!                 │ Some(phase)
//!                 ▼
//!         EscalationLedger::has_escalated?        dedup, fails open
//!                 │ no
//!                 ▼
//!         EscalationExecutor::execute_phase       paced recipient fan-out
//!                 │
//!                 ▼
//!         EscalationLedger::record                create-if-absent audit record
//! ```
//!
//! [`SessionScanner`] runs this for every active session; the manual
//! trigger surface runs it for one session, or fires the unconditional
//! emergency broadcast that skips the calculator and the ledger check.

pub mod executor;
pub mod ledger;
pub mod phase;
pub mod scanner;

pub use executor::{EscalationExecutor, ExecutionResult, RecipientOutcome};
pub use ledger::{EscalationLedger, EscalationRecord, EscalationTrigger};
pub use phase::{
    calculate_phase, escalation_status, minutes_until_next_phase, EscalationPhase,
    EscalationStatus, PhaseThresholds,
};
pub use scanner::{ScanSummary, SessionOutcome, SessionScanner};
