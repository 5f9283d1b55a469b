//! Result aggregation.
//!
//! The ledger only grows: phases are appended in execution order and no
//! entry is ever dropped or reordered.

use crate::check::{CheckOutcome, CheckSpec, OutcomeTag, Phase};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One check and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Check identifier
    pub id: String,
    /// Check description
    pub description: String,
    /// Outcome
    #[serde(flatten)]
    pub outcome: CheckOutcome,
    /// Wall-clock time spent on the check
    pub duration_ms: u64,
}

impl CheckRecord {
    /// Record the outcome of a check
    #[must_use]
    pub fn new(spec: &CheckSpec, outcome: CheckOutcome, duration_ms: u64) -> Self {
        Self {
            id: spec.id.clone(),
            description: spec.description.clone(),
            outcome,
            duration_ms,
        }
    }
}

/// All outcomes of one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Phase key
    pub key: String,
    /// Phase display name
    pub name: String,
    /// Outcomes in declaration order
    pub checks: Vec<CheckRecord>,
}

impl PhaseRecord {
    /// Empty record for a phase
    #[must_use]
    pub fn for_phase(phase: &Phase) -> Self {
        Self {
            key: phase.key.clone(),
            name: phase.name.clone(),
            checks: Vec::with_capacity(phase.checks.len()),
        }
    }

    /// Outcome of a check in this phase
    #[must_use]
    pub fn outcome(&self, id: &str) -> Option<&CheckOutcome> {
        self.checks.iter().find(|c| c.id == id).map(|c| &c.outcome)
    }

    /// Number of checks with the given tag
    #[must_use]
    pub fn count(&self, tag: OutcomeTag) -> usize {
        self.checks.iter().filter(|c| c.outcome.tag() == tag).count()
    }
}

/// Ordered record of every outcome in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    phases: Vec<PhaseRecord>,
}

impl Ledger {
    /// Empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a phase's outcomes
    #[must_use]
    pub fn append(mut self, record: PhaseRecord) -> Self {
        self.phases.push(record);
        self
    }

    /// Phase records in execution order
    #[must_use]
    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    /// Every check record in execution order
    pub fn records(&self) -> impl Iterator<Item = &CheckRecord> {
        self.phases.iter().flat_map(|p| p.checks.iter())
    }

    /// Every check id in execution order
    #[must_use]
    pub fn check_ids(&self) -> Vec<&str> {
        self.records().map(|r| r.id.as_str()).collect()
    }

    /// Outcome of a check anywhere in the ledger
    #[must_use]
    pub fn outcome(&self, id: &str) -> Option<&CheckOutcome> {
        self.phases.iter().find_map(|p| p.outcome(id))
    }

    /// Total number of checks
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.iter().map(|p| p.checks.len()).sum()
    }

    /// Whether no check has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of checks with the given tag
    #[must_use]
    pub fn count(&self, tag: OutcomeTag) -> usize {
        self.phases.iter().map(|p| p.count(tag)).sum()
    }

    /// Whether every check declared by `phases` appears exactly once, and
    /// nothing else does
    #[must_use]
    pub fn covers(&self, phases: &[Phase]) -> bool {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for id in self.check_ids() {
            *seen.entry(id).or_default() += 1;
        }
        let declared: Vec<&str> = phases
            .iter()
            .flat_map(|p| p.checks.iter().map(|c| c.id.as_str()))
            .collect();
        declared.len() == seen.len() && declared.iter().all(|id| seen.get(id) == Some(&1))
    }
}
