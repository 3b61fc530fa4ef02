use std::fmt::Write;

use crate::rules::RuleMetadata;
use crate::scanners::ScannerKind;
use crate::ScanReport;

/// Render results as plain console text: one block per resource, broken
/// checks first, then failures and the verdict.
pub fn render(report: &ScanReport) -> String {
    let mut output = String::new();

    if report.results.is_empty() {
        output.push_str("\n  No resources found.\n");
    } else {
        let _ = writeln!(
            output,
            "\n  {} resource(s) scanned in subscription {}:\n",
            report.results.len(),
            report.subscription_id
        );
    }

    for result in &report.results {
        let _ = writeln!(
            output,
            "  {} ({}) in {} [{}]",
            result.service_name,
            result.resource_type,
            result.resource_group,
            if result.location.is_empty() {
                "-"
            } else {
                &result.location
            },
        );

        let mut rules: Vec<_> = result.rules.iter().collect();
        rules.sort_by_key(|(_, outcome)| !outcome.broken);
        for (id, outcome) in rules {
            let tag = if outcome.broken { "[BROKEN]" } else { "[OK]    " };
            if outcome.detail.is_empty() {
                let _ = writeln!(output, "    {tag} {id}");
            } else {
                let _ = writeln!(output, "    {tag} {id}: {}", outcome.detail);
            }
        }
        output.push('\n');
    }

    if !report.failures.is_empty() {
        let _ = writeln!(output, "  {} scanner failure(s):", report.failures.len());
        for failure in &report.failures {
            let _ = writeln!(
                output,
                "    {} / {}: {}",
                failure.scanner,
                failure.resource_group.as_deref().unwrap_or("init"),
                failure.error
            );
        }
        output.push('\n');
    }

    let verdict = &report.verdict;
    let status = if verdict.pass { "PASS" } else { "FAIL" };
    let _ = writeln!(
        output,
        "  Result: {} ({} resources, {}/{} checks broken, {} failed job(s))\n",
        status,
        verdict.total_resources,
        verdict.broken_checks,
        verdict.total_checks,
        verdict.failed_scanners,
    );

    output
}

pub fn render_rules(catalog: &[(ScannerKind, Vec<RuleMetadata>)]) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<8} {:<20} {:<24} RECOMMENDATION",
        "KIND", "ID", "CATEGORY"
    );
    output.push_str(&"-".repeat(90));
    output.push('\n');
    for (kind, rules) in catalog {
        for rule in rules {
            let _ = writeln!(
                output,
                "{:<8} {:<20} {:<24} {}",
                kind.code(),
                rule.id,
                rule.category.to_string(),
                rule.recommendation
            );
        }
    }
    output
}
