//! Standard phase catalogue.
//!
//! One phase per dashboard feature area, in report order. Every check id is
//! `phase_key.name`, so ids are unique across the catalogue.

use crate::check::{CheckSpec, Phase, Probe, SyntheticInput};
use crate::config::RunConfig;
use crate::contract::{
    ATTACK_COUNT, EXPORT_FUNCTIONS, LARGE_WORLD_MAP, LOAD_INITIAL_DATA, MAP_FUNCTIONS,
    REMOVED_EXPORT_LABEL, STAT_CARDS, TIMELINE_CHART, TOP_LISTS, UPDATE_TIMELINE, WORLD_MAP,
};
use crate::result::{DashError, DashResult};

/// Events fed to the timeline chart
const TIMELINE_EVENTS: usize = 5;

fn callable(phase: &str, name: &str) -> CheckSpec {
    CheckSpec::new(
        format!("{phase}.fn.{name}"),
        format!("{name}() is exposed on window"),
        Probe::Callable {
            name: name.to_string(),
        },
    )
}

/// World map container, map functions and marker placement
#[must_use]
pub fn world_map(config: &RunConfig) -> Phase {
    let mut phase = Phase::new("world_map", "World Map")
        .with_check(CheckSpec::new(
            "world_map.container",
            format!("#{WORLD_MAP} is rendered after initializeMaps()"),
            Probe::ElementRendered {
                id: WORLD_MAP.to_string(),
                initialize: Some(MAP_FUNCTIONS[0].to_string()),
            },
        ))
        .with_check(CheckSpec::new(
            "world_map.secondary_container",
            format!("#{LARGE_WORLD_MAP} is rendered when present"),
            Probe::OptionalElement {
                id: LARGE_WORLD_MAP.to_string(),
            },
        ));
    for name in MAP_FUNCTIONS {
        phase = phase.with_check(callable("world_map", name));
    }
    let marker_fn = MAP_FUNCTIONS[1];
    phase.with_check(
        CheckSpec::new(
            "world_map.marker_increment",
            format!("{marker_fn}() adds to {}", config.marker_array),
            Probe::MarkerIncrement {
                function: marker_fn.to_string(),
                array: config.marker_array.clone(),
            },
        )
        .requires(format!("world_map.fn.{marker_fn}")),
    )
}

/// Timeline chart container and update contract
#[must_use]
pub fn timeline() -> Phase {
    Phase::new("timeline", "Timeline Chart")
        .with_check(CheckSpec::new(
            "timeline.container",
            format!("#{TIMELINE_CHART} exists"),
            Probe::ElementPresent {
                id: TIMELINE_CHART.to_string(),
            },
        ))
        .with_check(callable("timeline", UPDATE_TIMELINE))
        .with_check(
            CheckSpec::new(
                "timeline.accepts_events",
                format!("{UPDATE_TIMELINE}() accepts an ordered event list"),
                Probe::AcceptsInput {
                    function: UPDATE_TIMELINE.to_string(),
                    input: SyntheticInput::Timeline {
                        count: TIMELINE_EVENTS,
                    },
                },
            )
            .requires(format!("timeline.fn.{UPDATE_TIMELINE}")),
        )
}

/// Push-channel library, channel object and live counter
#[must_use]
pub fn live_channel(config: &RunConfig) -> Phase {
    let global = &config.channel_global;
    Phase::new("live_channel", "Live-Update Channel")
        .with_check(CheckSpec::new(
            "live_channel.library",
            format!("channel client library ({}) is loaded", config.channel_library),
            Probe::Callable {
                name: config.channel_library.clone(),
            },
        ))
        .with_check(CheckSpec::new(
            "live_channel.object",
            format!("channel object `{global}` exists"),
            Probe::ChannelPresent {
                global: global.clone(),
            },
        ))
        .with_check(
            CheckSpec::new(
                "live_channel.connected",
                format!("`{global}` reports connected with an id"),
                Probe::ChannelConnected {
                    global: global.clone(),
                },
            )
            .requires("live_channel.object"),
        )
        .with_check(CheckSpec::new(
            "live_channel.attack_counter",
            format!("#{ATTACK_COUNT} exists"),
            Probe::ElementPresent {
                id: ATTACK_COUNT.to_string(),
            },
        ))
}

/// Top-N containers and their graceful-empty-input contract
#[must_use]
pub fn top_lists() -> Phase {
    let mut phase = Phase::new("top_lists", "Top-N Lists");
    for list in TOP_LISTS {
        let exposed = format!("top_lists.{}.update_exposed", list.key);
        phase = phase
            .with_check(CheckSpec::new(
                format!("top_lists.{}.container", list.key),
                format!("#{} exists", list.element),
                Probe::ElementPresent {
                    id: list.element.to_string(),
                },
            ))
            .with_check(CheckSpec::new(
                exposed.clone(),
                format!("{}() is exposed on window", list.function),
                Probe::Callable {
                    name: list.function.to_string(),
                },
            ))
            .with_check(
                CheckSpec::new(
                    format!("top_lists.{}.null_input", list.key),
                    format!("{}(null) does not throw", list.function),
                    Probe::AcceptsInput {
                        function: list.function.to_string(),
                        input: SyntheticInput::Null,
                    },
                )
                .requires(exposed.clone()),
            )
            .with_check(
                CheckSpec::new(
                    format!("top_lists.{}.empty_input", list.key),
                    format!("{}({{}}) does not throw", list.function),
                    Probe::AcceptsInput {
                        function: list.function.to_string(),
                        input: SyntheticInput::EmptyRecord,
                    },
                )
                .requires(exposed),
            );
    }
    phase
}

/// Export triggers and the removed statistics export
#[must_use]
pub fn export() -> Phase {
    let phase = EXPORT_FUNCTIONS
        .iter()
        .fold(Phase::new("export", "Export Functions"), |phase, name| {
            phase.with_check(callable("export", name))
        });
    phase.with_check(CheckSpec::new(
        "export.statistics_removed",
        format!("\"{REMOVED_EXPORT_LABEL}\" is not rendered"),
        Probe::TextAbsent {
            text: REMOVED_EXPORT_LABEL.to_string(),
        },
    ))
}

/// Summary cards show populated values
#[must_use]
pub fn statistics() -> Phase {
    let phase = STAT_CARDS
        .iter()
        .fold(Phase::new("statistics", "Statistics Cards"), |phase, id| {
            phase.with_check(CheckSpec::new(
                format!("statistics.{}", id.replace('-', "_")),
                format!("#{id} shows a value"),
                Probe::PopulatedText { id: id.to_string() },
            ))
        });
    phase.with_check(CheckSpec::new(
        "statistics.loader_exposed",
        format!("{LOAD_INITIAL_DATA}() is exposed on window"),
        Probe::Callable {
            name: LOAD_INITIAL_DATA.to_string(),
        },
    ))
}

/// Backend statistics and health, cross-checked with the page
#[must_use]
pub fn api() -> Phase {
    Phase::new("api", "API Cross-Check")
        .with_check(CheckSpec::new(
            "api.fetch_stats",
            "statistics endpoint returns a well-formed record",
            Probe::StatsAvailable,
        ))
        .with_check(CheckSpec::new(
            "api.non_negative_counts",
            "all counters are non-negative",
            Probe::StatsNonNegative,
        ))
        .with_check(CheckSpec::new(
            "api.geolocation_consistent",
            "geolocated recent attacks do not exceed recent attacks",
            Probe::StatsGeolocation,
        ))
        .with_check(CheckSpec::new(
            "api.success_rate_bounds",
            "success_rate lies within 0..=100",
            Probe::StatsSuccessRate,
        ))
        .with_check(CheckSpec::new(
            "api.dom_total_consistent",
            format!("#{} does not exceed total_connections", STAT_CARDS[0]),
            Probe::StatsDomTotal {
                id: STAT_CARDS[0].to_string(),
            },
        ))
        .with_check(CheckSpec::new(
            "api.health",
            "health endpoint reports healthy",
            Probe::Health,
        ))
}

/// Captured page errors
#[must_use]
pub fn instrumentation() -> Phase {
    Phase::new("instrumentation", "Instrumentation").with_check(CheckSpec::new(
        "instrumentation.no_page_errors",
        "no uncaught page error was captured",
        Probe::NoPageErrors,
    ))
}

/// The full catalogue in report order
#[must_use]
pub fn standard_phases(config: &RunConfig) -> Vec<Phase> {
    vec![
        world_map(config),
        timeline(),
        live_channel(config),
        top_lists(),
        export(),
        statistics(),
        api(),
        instrumentation(),
    ]
}

/// Keep only the phases named by `selectors`; an empty selector list keeps all
///
/// # Errors
///
/// Returns [`DashError::UnknownPhase`] for the first selector that names no
/// phase.
pub fn select(phases: Vec<Phase>, selectors: &[String]) -> DashResult<Vec<Phase>> {
    if selectors.is_empty() {
        return Ok(phases);
    }
    if let Some(unknown) = selectors
        .iter()
        .find(|s| !phases.iter().any(|p| p.matches(s)))
    {
        return Err(DashError::UnknownPhase {
            selector: unknown.clone(),
        });
    }
    Ok(phases
        .into_iter()
        .filter(|p| selectors.iter().any(|s| p.matches(s)))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_check_ids_are_unique_and_prefixed() {
        let phases = standard_phases(&RunConfig::default());
        let mut seen = HashSet::new();
        for phase in &phases {
            for check in &phase.checks {
                assert!(check.id.starts_with(&format!("{}.", phase.key)), "{}", check.id);
                assert!(seen.insert(check.id.clone()), "duplicate {}", check.id);
            }
        }
        assert_eq!(seen.len(), 50);
    }

    #[test]
    fn test_requirements_point_backwards_within_phase() {
        for phase in standard_phases(&RunConfig::default()) {
            for (i, check) in phase.checks.iter().enumerate() {
                for req in &check.requires {
                    assert!(
                        phase.checks[..i].iter().any(|c| &c.id == req),
                        "{} requires unknown or later check {req}",
                        check.id
                    );
                }
            }
        }
    }

    #[test]
    fn test_order() {
        let names: Vec<_> = standard_phases(&RunConfig::default())
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(
            names,
            [
                "World Map",
                "Timeline Chart",
                "Live-Update Channel",
                "Top-N Lists",
                "Export Functions",
                "Statistics Cards",
                "API Cross-Check",
                "Instrumentation"
            ]
        );
    }

    #[test]
    fn test_select() {
        let all = standard_phases(&RunConfig::default());
        let picked = select(all.clone(), &["api".into(), "World Map".into()]).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].key, "world_map");
        assert_eq!(select(all.clone(), &[]).unwrap().len(), all.len());
        let err = select(all, &["World Map".into(), "charts".into()]).unwrap_err();
        assert!(matches!(err, DashError::UnknownPhase { ref selector } if selector == "charts"));
        assert_eq!(err.to_string(), "Unknown phase 'charts'");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_marker_array_follows_config() {
        let mut config = RunConfig::default();
        config.marker_array = "markers".into();
        let phase = world_map(&config);
        let check = phase
            .checks
            .iter()
            .find(|c| c.id == "world_map.marker_increment")
            .unwrap();
        assert!(matches!(&check.probe, Probe::MarkerIncrement { array, .. } if array == "markers"));
    }
}
