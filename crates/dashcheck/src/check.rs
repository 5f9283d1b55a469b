//! Check and phase data model.
//!
//! A [`CheckSpec`] is declared once and never mutated; its [`Probe`] is
//! plain data that the phase runner interprets against a live session.

use serde::{Deserialize, Serialize};

/// Argument fed to a page function by [`Probe::AcceptsInput`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticInput {
    /// `null`
    Null,
    /// `{}`
    EmptyRecord,
    /// Ordered list of timestamped events built from the synthetic attack
    Timeline {
        /// Number of events
        count: usize,
    },
}

impl SyntheticInput {
    /// Short description for report details
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::EmptyRecord => "{}".to_string(),
            Self::Timeline { count } => format!("{count} timeline events"),
        }
    }
}

/// What a check inspects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "probe", rename_all = "snake_case")]
pub enum Probe {
    /// Element exists
    ElementPresent {
        /// Element identifier
        id: String,
    },
    /// Element exists and has content, optionally after calling an initializer
    ElementRendered {
        /// Element identifier
        id: String,
        /// Page function called first, when callable
        initialize: Option<String>,
    },
    /// Element may be absent (`Skipped`); when present it must have content
    OptionalElement {
        /// Element identifier
        id: String,
    },
    /// Element text is populated (not a placeholder)
    PopulatedText {
        /// Element identifier
        id: String,
    },
    /// Name on the page's global object is callable
    Callable {
        /// Global name
        name: String,
    },
    /// Calling `function` with the synthetic attack grows `array`
    MarkerIncrement {
        /// Marker function
        function: String,
        /// Page-global marker array
        array: String,
    },
    /// Calling `function` with `input` does not throw
    AcceptsInput {
        /// Page function
        function: String,
        /// Argument
        input: SyntheticInput,
    },
    /// Channel object exists
    ChannelPresent {
        /// Global name
        global: String,
    },
    /// Channel reports connected with a non-empty identifier (`Skipped` if
    /// it does not expose a connection state)
    ChannelConnected {
        /// Global name
        global: String,
    },
    /// Rendered body text does not contain `text`
    TextAbsent {
        /// Forbidden text
        text: String,
    },
    /// Statistics endpoint answers with a well-formed record
    StatsAvailable,
    /// All counters in the statistics record are non-negative
    StatsNonNegative,
    /// Geolocated recent attacks ≤ all recent attacks
    StatsGeolocation,
    /// `success_rate`, when present, lies within `[0, 100]`
    StatsSuccessRate,
    /// Number rendered in `id` does not exceed the API `total_connections`
    StatsDomTotal {
        /// Element identifier
        id: String,
    },
    /// Health endpoint reports healthy
    Health,
    /// No uncaught page error was captured
    NoPageErrors,
}

/// A named, idempotent unit of verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    /// Unique identifier, `phase_key.check`
    pub id: String,
    /// Human-readable description
    pub description: String,
    /// Checks that must have passed first; otherwise this one is skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// What to inspect
    pub probe: Probe,
}

impl CheckSpec {
    /// Create a check
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>, probe: Probe) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            requires: Vec::new(),
            probe,
        }
    }

    /// Add a precondition
    #[must_use]
    pub fn requires(mut self, id: impl Into<String>) -> Self {
        self.requires.push(id.into());
        self
    }
}

/// Tag of a [`CheckOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeTag {
    /// Passed
    Pass,
    /// Failed
    Fail,
    /// Not attempted
    Skipped,
}

impl OutcomeTag {
    /// Upper-case label for reports
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum CheckOutcome {
    /// Check passed
    Pass {
        /// What was observed
        details: String,
    },
    /// Check failed
    Fail {
        /// Why
        reason: String,
    },
    /// Precondition unmet
    Skipped {
        /// Which precondition
        reason: String,
    },
}

impl CheckOutcome {
    /// Create a passing outcome
    #[must_use]
    pub fn pass(details: impl Into<String>) -> Self {
        Self::Pass {
            details: details.into(),
        }
    }

    /// Create a failing outcome
    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail {
            reason: reason.into(),
        }
    }

    /// Create a skipped outcome
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// The variant tag
    #[must_use]
    pub const fn tag(&self) -> OutcomeTag {
        match self {
            Self::Pass { .. } => OutcomeTag::Pass,
            Self::Fail { .. } => OutcomeTag::Fail,
            Self::Skipped { .. } => OutcomeTag::Skipped,
        }
    }

    /// Details, reason or skip reason
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Pass { details } => details,
            Self::Fail { reason } | Self::Skipped { reason } => reason,
        }
    }

    /// Whether the outcome is `Pass`
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }

    /// Whether the outcome is `Fail`
    #[must_use]
    pub const fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    /// Whether the outcome is `Skipped`
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// An ordered, named group of checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Short key, also the prefix of every check id
    pub key: String,
    /// Display name
    pub name: String,
    /// Checks in execution order
    pub checks: Vec<CheckSpec>,
}

impl Phase {
    /// Create an empty phase
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            checks: Vec::new(),
        }
    }

    /// Add a check
    #[must_use]
    pub fn with_check(mut self, check: CheckSpec) -> Self {
        self.checks.push(check);
        self
    }

    /// Number of checks
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    /// Whether `selector` names this phase (key or display name, any case,
    /// `-` and `_` interchangeable)
    #[must_use]
    pub fn matches(&self, selector: &str) -> bool {
        let norm = |s: &str| s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let wanted = norm(selector);
        wanted == norm(&self.key) || wanted == norm(&self.name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_tags_and_messages() {
            let pass = CheckOutcome::pass("ok");
            let fail = CheckOutcome::fail("broken");
            let skip = CheckOutcome::skipped("n/a");
            assert_eq!(pass.tag(), OutcomeTag::Pass);
            assert_eq!(fail.tag(), OutcomeTag::Fail);
            assert_eq!(skip.tag(), OutcomeTag::Skipped);
            assert_eq!(fail.message(), "broken");
            assert!(skip.is_skipped() && !skip.is_fail());
            assert_eq!(OutcomeTag::Skipped.label(), "SKIP");
        }

        #[test]
        fn test_outcome_serializes_tagged() {
            let json = serde_json::to_value(CheckOutcome::fail("x")).unwrap();
            assert_eq!(json, serde_json::json!({ "outcome": "fail", "reason": "x" }));
        }
    }

    mod phase_tests {
        use super::*;

        #[test]
        fn test_builder() {
            let phase = Phase::new("world_map", "World Map")
                .with_check(CheckSpec::new(
                    "world_map.fn.resetMap",
                    "resetMap is exposed",
                    Probe::Callable {
                        name: "resetMap".into(),
                    },
                ))
                .with_check(
                    CheckSpec::new(
                        "world_map.reset",
                        "resetMap runs",
                        Probe::AcceptsInput {
                            function: "resetMap".into(),
                            input: SyntheticInput::Null,
                        },
                    )
                    .requires("world_map.fn.resetMap"),
                );
            assert_eq!(phase.check_count(), 2);
            assert_eq!(phase.checks[1].requires, vec!["world_map.fn.resetMap"]);
        }

        #[test]
        fn test_selector_matching() {
            let phase = Phase::new("live_channel", "Live-Update Channel");
            assert!(phase.matches("live_channel"));
            assert!(phase.matches("live-channel"));
            assert!(phase.matches("live-update channel"));
            assert!(!phase.matches("world_map"));
        }
    }
}
