//! ChainAlert escalation engine CLI.
//!
//! Operational surface for exercising the escalation pipeline against a
//! JSON fixture of sessions and profiles: run one scan (what the external
//! periodic trigger does), check a single session, or fire the
//! unconditional emergency broadcast. Deliveries go through SendGrid
//! unless `--dry-run` is set.
//!
//! ```bash
//! # One scan pass over the fixture, logging instead of sending
//! chainalert --data fixtures/sessions.json --dry-run scan
//!
//! # Manual escalation check for one session
//! chainalert --data fixtures/sessions.json check --session abc123
//!
//! # Emergency broadcast for a user, with a location override
//! SENDGRID_API_KEY=... chainalert --data fixtures/sessions.json \
//!     emergency --user user-1 --lat 40.7128 --lng -74.0060
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use chainalert::config::EngineConfig;
use chainalert::escalation::{EscalationExecutor, EscalationLedger, SessionScanner};
use chainalert::model::{LocationData, Session, UserProfile};
use chainalert::notify::pacing::FixedDelayPacer;
use chainalert::notify::sendgrid::SendGridNotifier;
use chainalert::notify::{DeliveryReceipt, NotificationRequest, Notifier, NotifyError};
use chainalert::store::memory::{MemoryEscalationStore, MemoryProfileStore, MemorySessionStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML engine config; built-in defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON fixture with sessions and profiles to load
    #[arg(long)]
    data: PathBuf,

    /// Log deliveries instead of calling SendGrid
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every active session once, as the periodic trigger would
    Scan,
    /// Check and escalate a single session by id (idempotent)
    Check {
        #[arg(long)]
        session: String,
    },
    /// Unconditional emergency broadcast for a user
    Emergency {
        #[arg(long)]
        user: String,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lng: Option<f64>,
        #[arg(long)]
        address: Option<String>,
    },
}

/// Sessions and profiles loaded into the in-memory stores.
#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    sessions: Vec<Session>,
    #[serde(default)]
    profiles: Vec<UserProfile>,
}

/// Logs each would-be delivery instead of sending it.
struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, NotifyError> {
        info!(
            to = %request.to_email,
            phase = %request.phase,
            "dry-run: notification suppressed"
        );
        Ok(DeliveryReceipt { message_id: None })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let raw = std::fs::read_to_string(&args.data)
        .with_context(|| format!("failed to read fixture {}", args.data.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse fixture {}", args.data.display()))?;

    let sessions = Arc::new(MemorySessionStore::new());
    for session in fixture.sessions {
        sessions.insert(session).await;
    }
    let profiles = Arc::new(MemoryProfileStore::new());
    for profile in fixture.profiles {
        profiles.insert(profile).await;
    }
    let escalations = Arc::new(MemoryEscalationStore::new());

    let notifier: Arc<dyn Notifier> = if args.dry_run {
        Arc::new(DryRunNotifier)
    } else {
        match SendGridNotifier::from_env() {
            Ok(notifier) => Arc::new(notifier),
            // Distinct service-unavailable failure, not a silent drop.
            Err(err @ NotifyError::NotConfigured(_)) => {
                anyhow::bail!("escalation service unavailable: {err}")
            }
            Err(err) => return Err(err.into()),
        }
    };

    let pacer = Arc::new(FixedDelayPacer::new(config.send_gap()));
    let executor = EscalationExecutor::new(sessions.clone(), profiles, notifier, pacer)
        .with_send_timeout(config.send_timeout());
    let ledger = EscalationLedger::new(escalations);
    let scanner = SessionScanner::new(sessions, executor, ledger, config);

    let output = match args.command {
        Command::Scan => {
            let summary = scanner.run_scan(Utc::now()).await?;
            serde_json::to_value(summary)?
        }
        Command::Check { session } => {
            let outcome = scanner.trigger_for_session(&session, Utc::now()).await?;
            serde_json::to_value(outcome)?
        }
        Command::Emergency {
            user,
            session,
            lat,
            lng,
            address,
        } => {
            let location = match (lat, lng) {
                (Some(lat), Some(lng)) => Some(LocationData {
                    lat,
                    lng,
                    address,
                    timestamp: Utc::now(),
                }),
                _ => None,
            };
            let result = scanner
                .trigger_emergency(&user, session.as_deref(), location)
                .await?;
            serde_json::to_value(result)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
