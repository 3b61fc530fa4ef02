use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resource::AzureResource;

/// Outcome of evaluating one rule against one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleResult {
    /// Whether the resource violates the recommendation.
    pub broken: bool,
    /// Rule-specific detail (SLA figure, SKU name, or why the rule could not apply).
    pub detail: String,
}

impl RuleResult {
    pub fn new(broken: bool, detail: impl Into<String>) -> Self {
        Self {
            broken,
            detail: detail.into(),
        }
    }

    pub fn pass() -> Self {
        Self::new(false, "")
    }

    pub fn pass_with(detail: impl Into<String>) -> Self {
        Self::new(false, detail)
    }

    pub fn broken(detail: impl Into<String>) -> Self {
        Self::new(true, detail)
    }

    /// Shorthand for "required data is missing, so the rule does not apply".
    pub fn not_applicable(what: &str) -> Self {
        Self::pass_with(format!("{what} not reported"))
    }
}

/// Per-resource outcome of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
    pub resource_type: String,
    pub location: String,
    /// Rule id → result. Ordered so repeated runs serialize identically.
    pub rules: BTreeMap<String, RuleResult>,
}

impl ScanResult {
    pub fn new<R: AzureResource>(
        subscription_id: &str,
        resource_group: &str,
        resource: &R,
        rules: BTreeMap<String, RuleResult>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            service_name: resource.name().unwrap_or_default().to_string(),
            resource_type: resource.resource_type().unwrap_or_default().to_string(),
            location: resource.location().unwrap_or_default().to_string(),
            rules,
        }
    }

    pub fn broken_count(&self) -> usize {
        self.rules.values().filter(|r| r.broken).count()
    }
}
