use std::collections::BTreeMap;

use crate::error::Result;
use crate::rules::RuleMetadata;
use crate::scanners::ScannerKind;
use crate::ScanReport;

/// Render the full report as pretty JSON.
pub fn render(report: &ScanReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}

/// Rule catalog keyed by kind code.
pub fn render_rules(catalog: &[(ScannerKind, Vec<RuleMetadata>)]) -> Result<String> {
    let by_kind: BTreeMap<&str, &[RuleMetadata]> = catalog
        .iter()
        .map(|(kind, rules)| (kind.code(), rules.as_slice()))
        .collect();
    let json = serde_json::to_string_pretty(&by_kind)?;
    Ok(json)
}
