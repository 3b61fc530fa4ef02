//! Rule vocabulary shared by every scanner. Kind-specific tables compose
//! these with their own accessors and add extra checks on top.

use crate::context::{DiagnosticsStatus, ScanContext};
use crate::resource::AzureResource;

use super::{Category, Rule, RuleResult};

pub const DIAGNOSTIC_SETTINGS: &str = "DiagnosticSettings";
pub const AVAILABILITY_ZONES: &str = "AvailabilityZones";
pub const SLA: &str = "SLA";
pub const PRIVATE_ENDPOINT: &str = "Private";
pub const SKU: &str = "SKU";
pub const CAF: &str = "CAF";

/// Broken when the resource has no diagnostic settings. Reads the status
/// resolved into the scan context before evaluation.
pub fn diagnostic_settings<T: AzureResource>(recommendation: &str, url: &str) -> Rule<T> {
    Rule::new(
        DIAGNOSTIC_SETTINGS,
        Category::MonitoringAndLogging,
        recommendation,
        url,
        |r: &T, ctx: &ScanContext| {
            let Some(id) = r.id() else {
                return RuleResult::not_applicable("resource id");
            };
            match ctx.diagnostics_status(id) {
                Some(DiagnosticsStatus::Enabled) => RuleResult::pass(),
                Some(DiagnosticsStatus::Disabled) => RuleResult::broken(""),
                Some(DiagnosticsStatus::Unknown(reason)) => RuleResult::pass_with(format!(
                    "diagnostic settings could not be determined: {reason}"
                )),
                None => RuleResult::pass_with("diagnostic settings not checked"),
            }
        },
    )
}

/// Never broken; reports the published SLA for the resource's configuration.
pub fn sla<T, F>(recommendation: &str, url: &str, sla_of: F) -> Rule<T>
where
    T: 'static,
    F: Fn(&T) -> &'static str + Send + Sync + 'static,
{
    Rule::new(
        SLA,
        Category::HighAvailability,
        recommendation,
        url,
        move |r: &T, _ctx: &ScanContext| RuleResult::pass_with(sla_of(r)),
    )
}

/// Zone redundancy check. The accessor returns `None` when the data needed
/// to decide is absent.
pub fn availability_zones<T, F>(recommendation: &str, url: &str, zone_redundant: F) -> Rule<T>
where
    T: 'static,
    F: Fn(&T) -> Option<bool> + Send + Sync + 'static,
{
    Rule::new(
        AVAILABILITY_ZONES,
        Category::HighAvailability,
        recommendation,
        url,
        move |r: &T, _ctx: &ScanContext| match zone_redundant(r) {
            Some(true) => RuleResult::pass(),
            Some(false) => RuleResult::broken(""),
            None => RuleResult::not_applicable("zone configuration"),
        },
    )
}

pub fn private_endpoint<T, F>(recommendation: &str, url: &str, has_private: F) -> Rule<T>
where
    T: 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Rule::new(
        PRIVATE_ENDPOINT,
        Category::Security,
        recommendation,
        url,
        move |r: &T, _ctx: &ScanContext| RuleResult::new(!has_private(r), ""),
    )
}

/// Never broken; echoes the configured SKU name verbatim.
pub fn sku<T: 'static>(recommendation: &str, url: &str, sku_of: fn(&T) -> Option<&str>) -> Rule<T> {
    Rule::new(
        SKU,
        Category::Sku,
        recommendation,
        url,
        move |r: &T, _ctx: &ScanContext| RuleResult::pass_with(sku_of(r).unwrap_or_default()),
    )
}

/// Cloud Adoption Framework naming: the name must start with `prefix`.
pub fn caf<T: AzureResource>(prefix: &'static str, recommendation: &str, url: &str) -> Rule<T> {
    Rule::new(
        CAF,
        Category::Governance,
        recommendation,
        url,
        move |r: &T, _ctx: &ScanContext| match r.name() {
            Some(name) => RuleResult::new(!name.starts_with(prefix), ""),
            None => RuleResult::not_applicable("resource name"),
        },
    )
}

/// A boolean property that is fine unless explicitly switched off.
pub fn enabled_flag<T, F>(
    id: &str,
    category: Category,
    recommendation: &str,
    url: &str,
    flag: F,
) -> Rule<T>
where
    T: 'static,
    F: Fn(&T) -> Option<bool> + Send + Sync + 'static,
{
    let what = id.to_string();
    Rule::new(
        id,
        category,
        recommendation,
        url,
        move |r: &T, _ctx: &ScanContext| match flag(r) {
            Some(true) => RuleResult::pass(),
            Some(false) => RuleResult::broken(""),
            None => RuleResult::not_applicable(&format!("{what} setting")),
        },
    )
}
