//! Statistics API client.
//!
//! Requests are issued from inside the page, so the session's credentials,
//! cookies and cache bypass apply to them as well.

use crate::probe::PageProbe;
use crate::result::{DashError, DashResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Longest body excerpt carried by an API error
const SNIPPET_LEN: usize = 200;

/// Counts keyed by label (country, password, IP, ...)
pub type TopCounts = BTreeMap<String, i64>;

/// One entry of `recent_attacks`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentAttack {
    /// Source address
    #[serde(default)]
    pub ip: Option<String>,
    /// Event type
    #[serde(default)]
    pub event: Option<String>,
    /// Latitude, when geolocated
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude, when geolocated
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Country name
    #[serde(default)]
    pub country: Option<String>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RecentAttack {
    /// Carries both coordinates
    #[must_use]
    pub const fn is_geolocated(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// `map_data` section of the stats payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    /// Marker entries
    #[serde(default)]
    pub markers: Vec<Value>,
    /// Heat-map points
    #[serde(default)]
    pub heatpoints: Vec<Value>,
}

/// Parsed statistics response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Every recorded connection
    pub total_connections: i64,
    /// Failed login attempts
    pub failed_logins: i64,
    /// Successful login attempts
    pub successful_logins: i64,
    /// Commands run by attackers
    #[serde(default)]
    pub commands_executed: Option<i64>,
    /// Distinct source addresses
    #[serde(default)]
    pub unique_ips: Option<i64>,
    /// Distinct passwords tried
    #[serde(default)]
    pub unique_passwords: Option<i64>,
    /// Distinct usernames tried
    #[serde(default)]
    pub unique_users: Option<i64>,
    /// Successful logins as a percentage of all logins
    #[serde(default)]
    pub success_rate: Option<f64>,
    /// Most recent attacks, newest first
    #[serde(default)]
    pub recent_attacks: Vec<RecentAttack>,
    /// Raised alerts
    #[serde(default)]
    pub alerts: Vec<Value>,
    /// Attack counts per country
    #[serde(default)]
    pub top_countries: TopCounts,
    /// Attack counts per organization
    #[serde(default)]
    pub top_organizations: TopCounts,
    /// Attempts per password
    #[serde(default)]
    pub top_passwords: TopCounts,
    /// Attacks per source address
    #[serde(default)]
    pub top_ips: TopCounts,
    /// Attempts per username
    #[serde(default)]
    pub top_users: TopCounts,
    /// Executions per command
    #[serde(default)]
    pub top_commands: TopCounts,
    /// Attacks per autonomous system
    #[serde(default)]
    pub top_asns: TopCounts,
    /// Map markers and heat-map points
    #[serde(default)]
    pub map_data: MapData,
}

impl StatsResponse {
    /// Recent attacks carrying both coordinates
    #[must_use]
    pub fn geolocated_count(&self) -> usize {
        self.recent_attacks
            .iter()
            .filter(|a| a.is_geolocated())
            .count()
    }

    /// Named counters that are negative
    #[must_use]
    pub fn negative_counts(&self) -> Vec<&'static str> {
        let optional = [
            ("commands_executed", self.commands_executed),
            ("unique_ips", self.unique_ips),
            ("unique_passwords", self.unique_passwords),
            ("unique_users", self.unique_users),
        ];
        [
            ("total_connections", self.total_connections),
            ("failed_logins", self.failed_logins),
            ("successful_logins", self.successful_logins),
        ]
        .into_iter()
        .chain(optional.into_iter().filter_map(|(name, v)| v.map(|v| (name, v))))
        .filter(|(_, v)| *v < 0)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Parsed health response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Reported status, `healthy` when up
    pub status: String,
    /// Whether the log monitor is running
    #[serde(default)]
    pub monitor_running: Option<bool>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl HealthResponse {
    /// Whether the backend reports itself healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > SNIPPET_LEN {
        let head: String = trimmed.chars().take(SNIPPET_LEN).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}

/// Client for the dashboard's JSON endpoints
#[derive(Debug, Clone, Copy)]
pub struct ApiClient<'s> {
    probe: PageProbe<'s>,
}

impl<'s> ApiClient<'s> {
    /// Create a client issuing requests through a probe
    #[must_use]
    pub const fn new(probe: PageProbe<'s>) -> Self {
        Self { probe }
    }

    /// Fetch and parse the statistics endpoint
    ///
    /// # Errors
    ///
    /// [`DashError::Api`] on transport failure, non-200 status or a body that
    /// does not match [`StatsResponse`].
    pub async fn fetch_stats(&self) -> DashResult<StatsResponse> {
        let path = self.probe.session().config().stats_path.clone();
        self.get_json(&path).await
    }

    /// Fetch and parse the health endpoint
    pub async fn fetch_health(&self) -> DashResult<HealthResponse> {
        let path = self.probe.session().config().health_path.clone();
        self.get_json(&path).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> DashResult<T> {
        let url = self.probe.session().config().url_for(path);
        let response = self.probe.fetch(&url).await?;
        tracing::debug!(%url, status = response.status, "api response");

        if let Some(error) = response.error {
            return Err(DashError::Api {
                status: 0,
                snippet: snippet(&error),
            });
        }
        if response.status != 200 {
            return Err(DashError::Api {
                status: response.status,
                snippet: snippet(&response.body),
            });
        }
        serde_json::from_str(&response.body).map_err(|e| DashError::Api {
            status: response.status,
            snippet: format!("malformed body ({e}): {}", snippet(&response.body)),
        })
    }
}
