//! Run configuration.
//!
//! Target origin, credentials, timing and the synthetic inputs fed to the
//! page are all run configuration rather than fixed behavior.

use crate::contract::SyntheticAttack;
use crate::hooks::UrlPattern;
use base64::Engine;
use std::time::Duration;

/// Default dashboard origin
pub const DEFAULT_TARGET: &str = "http://localhost:3333";

/// Default settle delay after network idle (3 seconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3_000;

/// Default navigation timeout (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default per-probe timeout (10 seconds)
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Network idle threshold (500ms without requests)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Username/password pair sent as HTTP Basic auth on every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create a credential pair
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value of the `Authorization` header
    #[must_use]
    pub fn authorization_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for one verification run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Dashboard origin, e.g. `http://localhost:3333`
    pub target: String,
    /// Credentials injected into every request
    pub credentials: Option<Credentials>,
    /// Delay after network idle before checks start
    pub settle_delay: Duration,
    /// Deadline for navigation plus network idle
    pub navigation_timeout: Duration,
    /// Deadline for each evaluate or fetch
    pub probe_timeout: Duration,
    /// Quiet window that counts as network idle
    pub idle_threshold: Duration,
    /// Statistics endpoint path
    pub stats_path: String,
    /// Health endpoint path
    pub health_path: String,
    /// Network events worth recording
    pub interesting_endpoints: Vec<UrlPattern>,
    /// Synthetic attack fed to map and timeline
    pub synthetic_attack: SyntheticAttack,
    /// Page-global array holding map markers
    pub marker_array: String,
    /// Page-global live-update channel object
    pub channel_global: String,
    /// Page-global channel client factory (library loaded check)
    pub channel_library: String,
    /// Texts that mean a card has not been populated
    pub placeholders: Vec<String>,
    /// Browser settings
    pub browser: BrowserConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            credentials: None,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            navigation_timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            idle_threshold: Duration::from_millis(NETWORK_IDLE_THRESHOLD_MS),
            stats_path: "/api/stats".to_string(),
            health_path: "/api/health".to_string(),
            interesting_endpoints: vec![
                UrlPattern::Contains("/api/".to_string()),
                UrlPattern::Contains("/socket.io/".to_string()),
            ],
            synthetic_attack: SyntheticAttack::default(),
            marker_array: "attackMarkers".to_string(),
            channel_global: "socket".to_string(),
            channel_library: "io".to_string(),
            placeholders: ["", "-", "--", "...", "0...", "Loading...", "N/A"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            browser: BrowserConfig::default(),
        }
    }
}

impl RunConfig {
    /// Create a config for the given origin
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Set credentials
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set settle delay
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set navigation timeout
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Set per-probe timeout
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the synthetic attack template
    #[must_use]
    pub fn with_synthetic_attack(mut self, attack: SyntheticAttack) -> Self {
        self.synthetic_attack = attack;
        self
    }

    /// Set browser settings
    #[must_use]
    pub fn with_browser(mut self, browser: BrowserConfig) -> Self {
        self.browser = browser;
        self
    }

    /// Add a URL pattern to the instrumentation allow-list
    #[must_use]
    pub fn with_interesting_endpoint(mut self, pattern: UrlPattern) -> Self {
        self.interesting_endpoints.push(pattern);
        self
    }

    /// Absolute URL for a path on the target origin
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.target.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Whether a card text counts as "not yet rendered"
    #[must_use]
    pub fn is_placeholder(&self, text: &str) -> bool {
        let trimmed = text.trim();
        self.placeholders
            .iter()
            .any(|p| p.eq_ignore_ascii_case(trimmed))
    }
}
