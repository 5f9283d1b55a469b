//! Status evaluation.
//!
//! A pure reduction of the ledger: the verdict is `Fail` if and only if some
//! check failed. Skipped checks are listed separately and never fail a run.

use crate::check::CheckOutcome;
use crate::ledger::Ledger;
use serde::{Deserialize, Serialize};

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// No check failed
    Pass,
    /// At least one check failed
    Fail,
}

impl Verdict {
    /// Upper-case label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict plus the checks behind it; immutable once derived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallStatus {
    verdict: Verdict,
    failing: Vec<String>,
    skipped: Vec<String>,
    passed: usize,
    total: usize,
}

impl OverallStatus {
    /// Reduce a ledger to its status
    #[must_use]
    pub fn evaluate(ledger: &Ledger) -> Self {
        let mut failing = Vec::new();
        let mut skipped = Vec::new();
        let mut passed = 0;
        for record in ledger.records() {
            match record.outcome {
                CheckOutcome::Pass { .. } => passed += 1,
                CheckOutcome::Fail { .. } => failing.push(record.id.clone()),
                CheckOutcome::Skipped { .. } => skipped.push(record.id.clone()),
            }
        }
        let verdict = if failing.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        Self {
            verdict,
            failing,
            skipped,
            passed,
            total: ledger.len(),
        }
    }

    /// Overall verdict
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Ids of failing checks in ledger order
    #[must_use]
    pub fn failing(&self) -> &[String] {
        &self.failing
    }

    /// Ids of skipped checks in ledger order
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Number of passing checks
    #[must_use]
    pub const fn passed(&self) -> usize {
        self.passed
    }

    /// Number of recorded checks
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Whether the verdict is `Pass`
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self.verdict, Verdict::Pass)
    }
}
