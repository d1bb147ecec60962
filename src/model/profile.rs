//! User profiles and the emergency/legal contact partition.

use serde::{Deserialize, Serialize};

/// A notification recipient belonging to a user profile.
///
/// The `is_legal` flag partitions contacts into personal emergency contacts
/// (critical tier) and organizational/legal contacts (legal tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub contact_id: String,
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub email: Option<String>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub is_legal: bool,
    pub organization: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// The slice of a user profile the engine needs: identity for templates and
/// the contact list for recipient fan-out. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }

    /// Personal emergency contacts, in stored list order.
    pub fn emergency_contacts(&self) -> Vec<&EmergencyContact> {
        self.emergency_contacts
            .iter()
            .filter(|c| c.is_active && !c.is_legal)
            .collect()
    }

    /// Legal/organizational contacts, in stored list order.
    pub fn legal_contacts(&self) -> Vec<&EmergencyContact> {
        self.emergency_contacts
            .iter()
            .filter(|c| c.is_active && c.is_legal)
            .collect()
    }
}
