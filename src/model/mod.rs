//! Data entities the engine reads and mutates.
//!
//! Sessions are owned by the user who created them; the engine only mutates
//! them through the conditional transitions exposed by `store::SessionStore`.
//! Profiles and contacts are read-only from the engine's perspective.

pub mod profile;
pub mod session;

pub use profile::{EmergencyContact, UserProfile};
pub use session::{
    CheckIn, CheckInMethod, LocationData, ProtectionLevel, Session, SessionStats, SessionStatus,
};
