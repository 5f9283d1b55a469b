//! The dashboard contract consumed by the standard phases.
//!
//! Element identifiers, page-global function names and the record shapes the
//! page functions accept. A dashboard targeted by Dashcheck must honor these
//! exactly.

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Primary map container
pub const WORLD_MAP: &str = "world-map";
/// Optional full-screen map container
pub const LARGE_WORLD_MAP: &str = "large-world-map";
/// Live attack counter
pub const ATTACK_COUNT: &str = "attack-count";
/// Timeline chart container
pub const TIMELINE_CHART: &str = "timeline-chart";

/// Summary-value elements shown as statistics cards
pub const STAT_CARDS: [&str; 4] = [
    "total-connections",
    "failed-logins",
    "successful-logins",
    "unique-ips",
];

/// Map functions exposed on `window`
pub const MAP_FUNCTIONS: [&str; 4] = [
    "initializeMaps",
    "addAttackMarker",
    "resetMap",
    "toggleHeatmap",
];

/// Timeline update function
pub const UPDATE_TIMELINE: &str = "updateTimelineChart";

/// Export triggers exposed on `window`
pub const EXPORT_FUNCTIONS: [&str; 3] = ["exportLogs", "exportAlerts", "exportCredentials"];

/// Initial data loader
pub const LOAD_INITIAL_DATA: &str = "loadInitialData";

/// Text of the removed "export statistics" affordance
pub const REMOVED_EXPORT_LABEL: &str = "Export Statistics";

/// A top-N list: its container element and the function that repopulates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopList {
    /// Short key used in check identifiers
    pub key: &'static str,
    /// Container element identifier
    pub element: &'static str,
    /// Update function name
    pub function: &'static str,
}

/// The fixed set of top-N lists
pub const TOP_LISTS: [TopList; 5] = [
    TopList {
        key: "passwords",
        element: "top-passwords",
        function: "updateTopPasswords",
    },
    TopList {
        key: "countries",
        element: "top-countries",
        function: "updateTopCountries",
    },
    TopList {
        key: "organizations",
        element: "top-organizations",
        function: "updateTopOrganizations",
    },
    TopList {
        key: "ips",
        element: "top-ips",
        function: "updateTopIPs",
    },
    TopList {
        key: "users",
        element: "top-users",
        function: "updateTopUsers",
    },
];

/// Attack record accepted by `addAttackMarker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    /// Source address
    pub ip: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Country name
    pub country: String,
    /// ISO-8601 timestamp
    pub timestamp: String,
    /// Event identifier, e.g. `login.failed`
    pub event: String,
    /// Attempted username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Attempted password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Template for the synthetic attack fed to the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticAttack {
    /// Source address
    pub ip: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Country name
    pub country: String,
    /// Event identifier
    pub event: String,
}

impl Default for SyntheticAttack {
    fn default() -> Self {
        Self {
            ip: "203.0.113.7".to_string(),
            latitude: 52.52,
            longitude: 13.405,
            country: "Germany".to_string(),
            event: "login.failed".to_string(),
        }
    }
}

impl SyntheticAttack {
    /// Stamp the template into a full record
    #[must_use]
    pub fn record_at(&self, at: DateTime<Utc>) -> AttackRecord {
        AttackRecord {
            ip: self.ip.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            country: self.country.clone(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            event: self.event.clone(),
            username: Some("root".to_string()),
            password: Some("dashcheck".to_string()),
        }
    }

    /// An ordered list of `count` timeline events ending at `end`, one minute apart.
    #[must_use]
    pub fn timeline_ending_at(&self, end: DateTime<Utc>, count: usize) -> Vec<TimelineEvent> {
        (0..count)
            .rev()
            .map(|back| {
                let at = end - ChronoDuration::minutes(back as i64);
                TimelineEvent {
                    timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
                    event: self.event.clone(),
                    ip: self.ip.clone(),
                    country: self.country.clone(),
                }
            })
            .collect()
    }
}

/// Entry accepted by `updateTimelineChart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// ISO-8601 timestamp
    pub timestamp: String,
    /// Event identifier
    pub event: String,
    /// Source address
    pub ip: String,
    /// Country name
    pub country: String,
}
