//! ChainAlert Escalation Engine
//!
//! A user starts a timed protection session and must check in on a fixed
//! cadence. When check-ins stop, the engine walks the session up an
//! escalation ladder, executing each phase's notifications exactly once.
//!
//! # Escalation Ladder
//!
//! ```text
//! check-in overdue (minutes past next_check_in_due)
//!     │
//!     ├─ ≥ 0     → soft_warning    (in-app reminder to the owner)
//!     ├─ ≥ 15    → medium_alert    (email to the owner)
//!     ├─ ≥ 60    → critical_alert  (email to emergency contacts)
//!     └─ ≥ 1440  → legal_alert     (email to legal organizations,
//!                                   session marked `escalated`)
//!
//! emergency button → all of the above recipients at once, session
//!                    force-terminated to `emergency` (never deduplicated)
//! ```
//!
//! The phase computation is a pure function of (session, now), so an
//! external scheduler can invoke [`escalation::SessionScanner::run_scan`]
//! every few minutes indefinitely: the escalation ledger records each
//! (session, phase) pair and suppresses repeats.
//!
//! Persistent storage, outbound email delivery, and the periodic trigger
//! itself are external collaborators behind the traits in [`store`] and
//! [`notify`].

pub mod config;
pub mod error;
pub mod escalation;
pub mod model;
pub mod notify;
pub mod store;

pub use error::EngineError;
