//! Session — the unit of protection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a session. Only `Active` sessions are eligible for
/// phase computation; every other state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
    Emergency,
    Escalated,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Emergency => write!(f, "emergency"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// Categorical trip-type chosen when the session is started. Used by
/// notification templates, not by phase computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionLevel {
    Short,
    Work,
    Overnight,
    Highrisk,
    Custom,
}

impl std::fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Work => write!(f, "work"),
            Self::Overnight => write!(f, "overnight"),
            Self::Highrisk => write!(f, "highrisk"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// How a check-in was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInMethod {
    Manual,
    Automatic,
    Geofence,
}

/// Last known position, with an optional reverse-geocoded address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationData {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for LocationData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.address {
            Some(address) => {
                write!(f, "{} (GPS: {:.6}, {:.6})", address, self.lat, self.lng)
            }
            None => write!(f, "GPS: {:.6}, {:.6}", self.lat, self.lng),
        }
    }
}

/// A single safety confirmation from the session owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub check_in_id: String,
    pub timestamp: DateTime<Utc>,
    pub location: Option<LocationData>,
    pub method: CheckInMethod,
    /// Seconds between the check-in prompt and the user's response.
    pub response_time_secs: u64,
}

impl CheckIn {
    pub fn manual(
        timestamp: DateTime<Utc>,
        location: Option<LocationData>,
        response_time_secs: u64,
    ) -> Self {
        Self {
            check_in_id: Uuid::new_v4().to_string(),
            timestamp,
            location,
            method: CheckInMethod::Manual,
            response_time_secs,
        }
    }
}

/// Derived check-in statistics, updated on every check-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_check_ins: u32,
    pub average_response_time_secs: f64,
    pub missed_check_ins: u32,
    pub last_check_in_at: Option<DateTime<Utc>>,
}

/// A timed protection session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub protection_level: ProtectionLevel,
    pub destination: String,
    pub notes: String,
    pub check_in_interval_minutes: i64,
    pub duration_minutes: i64,
    pub started_at: DateTime<Utc>,
    /// Instant the next check-in is required by. Advanced forward by
    /// `check_in_interval_minutes` on every check-in; never moved backward.
    pub next_check_in_due: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub check_ins: Vec<CheckIn>,
    pub stats: SessionStats,
    pub location: Option<LocationData>,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        protection_level: ProtectionLevel,
        destination: impl Into<String>,
        check_in_interval_minutes: i64,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            status: SessionStatus::Active,
            protection_level,
            destination: destination.into(),
            notes: String::new(),
            check_in_interval_minutes,
            duration_minutes,
            started_at: now,
            next_check_in_due: now + Duration::minutes(check_in_interval_minutes),
            end_time: now + Duration::minutes(duration_minutes),
            ended_at: None,
            check_ins: Vec::new(),
            stats: SessionStats::default(),
            location: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Whole minutes past `next_check_in_due`, or `None` if not yet overdue.
    pub fn minutes_overdue(&self, now: DateTime<Utc>) -> Option<i64> {
        if now < self.next_check_in_due {
            return None;
        }
        Some((now - self.next_check_in_due).num_minutes())
    }

    /// Record a check-in: advance the due marker from the *due instant*
    /// (not the check-in time, so the cadence never drifts), refresh the
    /// location snapshot, and fold the response time into the stats.
    pub fn apply_check_in(&mut self, check_in: CheckIn) {
        self.next_check_in_due += Duration::minutes(self.check_in_interval_minutes);

        let n = self.stats.total_check_ins + 1;
        self.stats.average_response_time_secs = (self.stats.average_response_time_secs
            * f64::from(self.stats.total_check_ins)
            + check_in.response_time_secs as f64)
            / f64::from(n);
        self.stats.total_check_ins = n;
        self.stats.last_check_in_at = Some(check_in.timestamp);

        if check_in.location.is_some() {
            self.location = check_in.location.clone();
        }
        self.check_ins.push(check_in);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_at(now: DateTime<Utc>) -> Session {
        Session::new("user-1", ProtectionLevel::Short, "downtown", 60, 480, now)
    }

    #[test]
    fn check_in_advances_due_from_the_due_instant() {
        let start = Utc::now();
        let mut session = session_at(start);
        let old_due = session.next_check_in_due;

        // Check in 7 minutes late — the next due must still be anchored to
        // the previous due instant, not to the check-in timestamp.
        let late = old_due + Duration::minutes(7);
        session.apply_check_in(CheckIn::manual(late, None, 12));

        assert_eq!(session.next_check_in_due, old_due + Duration::minutes(60));
        assert!(session.next_check_in_due > old_due);
        assert_eq!(session.stats.total_check_ins, 1);
        assert_eq!(session.stats.last_check_in_at, Some(late));
    }

    #[test]
    fn check_in_updates_location_snapshot_and_average() {
        let start = Utc::now();
        let mut session = session_at(start);

        let here = LocationData {
            lat: 40.7128,
            lng: -74.006,
            address: Some("New York, NY".into()),
            timestamp: start,
        };
        session.apply_check_in(CheckIn::manual(start, Some(here), 10));
        session.apply_check_in(CheckIn::manual(start + Duration::minutes(60), None, 30));

        // A location-less check-in keeps the previous snapshot.
        assert!(session.location.is_some());
        assert_eq!(session.stats.total_check_ins, 2);
        assert!((session.stats.average_response_time_secs - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn minutes_overdue_is_none_before_due() {
        let start = Utc::now();
        let session = session_at(start);
        assert_eq!(session.minutes_overdue(start + Duration::minutes(59)), None);
        assert_eq!(
            session.minutes_overdue(start + Duration::minutes(75)),
            Some(15)
        );
    }

    #[test]
    fn location_display_falls_back_to_coordinates() {
        let loc = LocationData {
            lat: 34.0522,
            lng: -118.2437,
            address: None,
            timestamp: Utc::now(),
        };
        assert_eq!(loc.to_string(), "GPS: 34.052200, -118.243700");
    }
}
