//! Engine configuration.
//!
//! Defaults match the production ladder; deployments override via a TOML
//! file. SendGrid credentials stay in the environment (see
//! `notify::sendgrid::SendGridNotifier::from_env`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::escalation::phase::PhaseThresholds;

/// Tunables for the scanner and executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minutes-overdue thresholds for each phase.
    pub thresholds: PhaseThresholds,
    /// Minimum gap between outbound sends. SendGrid allows ~2 req/s.
    pub send_gap_ms: u64,
    /// Per-send bound; a hung delivery call becomes one failed recipient
    /// rather than stalling the fan-out.
    pub send_timeout_secs: u64,
    /// Per-session backstop so one stuck session cannot stall the scan.
    pub session_timeout_secs: u64,
    /// Overall scan deadline; sessions left unprocessed are picked up by
    /// the next scheduled scan (safe by idempotency). Keep below the
    /// external trigger cadence.
    pub scan_deadline_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: PhaseThresholds::default(),
            send_gap_ms: 600,
            send_timeout_secs: 30,
            session_timeout_secs: 30,
            scan_deadline_secs: 240,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            EngineError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }

    pub fn send_gap(&self) -> Duration {
        Duration::from_millis(self.send_gap_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn scan_deadline(&self) -> Duration {
        Duration::from_secs(self.scan_deadline_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_production_ladder() {
        let config = EngineConfig::default();
        assert_eq!(config.thresholds.medium_alert_minutes, 15);
        assert_eq!(config.thresholds.critical_alert_minutes, 60);
        assert_eq!(config.thresholds.legal_alert_minutes, 1440);
        assert_eq!(config.send_gap(), Duration::from_millis(600));
        assert_eq!(config.send_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_overrides_merge_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "send_gap_ms = 250\n\n[thresholds]\nlegal_alert_minutes = 720"
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.send_gap_ms, 250);
        assert_eq!(config.thresholds.legal_alert_minutes, 720);
        // Untouched fields keep their defaults.
        assert_eq!(config.thresholds.critical_alert_minutes, 60);
        assert_eq!(config.session_timeout_secs, 30);
    }

    #[test]
    fn unreadable_config_is_a_configuration_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/engine.toml")).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
