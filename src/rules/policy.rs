use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ScanResult;

/// Policy verdict: the final pass/fail decision after applying
/// the ignore list to raw scan results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub pass: bool,
    pub total_resources: usize,
    pub total_checks: usize,
    pub broken_checks: usize,
    pub failed_scanners: usize,
}

/// Policy configuration loaded from the `[policy]` section of `.azqr.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Rule IDs to drop from every result.
    #[serde(default)]
    pub ignore_rules: HashSet<String>,
    /// Fail the run when any remaining check is broken.
    #[serde(default)]
    pub fail_on_broken: bool,
}

impl Policy {
    /// Remove ignored rules from each result.
    pub fn apply(&self, results: &[ScanResult]) -> Vec<ScanResult> {
        results
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.rules.retain(|id, _| !self.ignore_rules.contains(id));
                r
            })
            .collect()
    }

    /// Evaluate results (and the number of failed scanner jobs) against this policy.
    pub fn evaluate(&self, results: &[ScanResult], failed_scanners: usize) -> PolicyVerdict {
        let mut total_checks = 0;
        let mut broken_checks = 0;
        for (id, outcome) in results.iter().flat_map(|r| r.rules.iter()) {
            if self.ignore_rules.contains(id) {
                continue;
            }
            total_checks += 1;
            if outcome.broken {
                broken_checks += 1;
            }
        }

        let failed = failed_scanners > 0 || (self.fail_on_broken && broken_checks > 0);

        PolicyVerdict {
            pass: !failed,
            total_resources: results.len(),
            total_checks,
            broken_checks,
            failed_scanners,
        }
    }
}
