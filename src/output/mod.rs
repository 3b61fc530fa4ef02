pub mod console;
pub mod json;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rules::RuleMetadata;
use crate::scanners::ScannerKind;
use crate::ScanReport;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    Json,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" | "table" => Some(Self::Console),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Render a report into the specified format.
pub fn render(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render(report)),
        OutputFormat::Json => json::render(report),
    }
}

/// Render the rule catalog, one table per kind.
pub fn render_rules(
    catalog: &[(ScannerKind, Vec<RuleMetadata>)],
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render_rules(catalog)),
        OutputFormat::Json => json::render_rules(catalog),
    }
}
