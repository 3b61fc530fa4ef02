pub mod common;
pub mod policy;
pub mod result;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::ScanContext;
use crate::error::{AzqrError, Result};

pub use result::{RuleResult, ScanResult};

/// Signature every rule predicate implements.
pub type EvalFn<T> = dyn Fn(&T, &ScanContext) -> RuleResult + Send + Sync;

/// A single best-practice check for one resource kind.
pub struct Rule<T> {
    pub id: String,
    pub category: Category,
    pub recommendation: String,
    pub url: String,
    eval: Box<EvalFn<T>>,
}

impl<T> Rule<T> {
    pub fn new<F>(
        id: impl Into<String>,
        category: Category,
        recommendation: impl Into<String>,
        url: impl Into<String>,
        eval: F,
    ) -> Self
    where
        F: Fn(&T, &ScanContext) -> RuleResult + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            category,
            recommendation: recommendation.into(),
            url: url.into(),
            eval: Box::new(eval),
        }
    }

    pub fn eval(&self, target: &T, ctx: &ScanContext) -> RuleResult {
        (self.eval)(target, ctx)
    }

    pub fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: self.id.clone(),
            category: self.category,
            recommendation: self.recommendation.clone(),
            url: self.url.clone(),
        }
    }
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MonitoringAndLogging,
    HighAvailability,
    Security,
    DisasterRecovery,
    Sku,
    Governance,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MonitoringAndLogging => write!(f, "Monitoring and Logging"),
            Self::HighAvailability => write!(f, "High Availability"),
            Self::Security => write!(f, "Security"),
            Self::DisasterRecovery => write!(f, "Disaster Recovery"),
            Self::Sku => write!(f, "SKU"),
            Self::Governance => write!(f, "Governance"),
        }
    }
}

/// Metadata about a rule, used for `list-rules` output and report joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub id: String,
    pub category: Category,
    pub recommendation: String,
    pub url: String,
}

/// An immutable rule table: non-empty, ids unique. Built once per scanner.
pub struct RuleTable<T> {
    rules: Vec<Rule<T>>,
}

impl<T> fmt::Debug for RuleTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTable")
            .field("ids", &self.ids())
            .finish()
    }
}

impl<T> RuleTable<T> {
    pub fn new(rules: Vec<Rule<T>>) -> Result<Self> {
        if rules.is_empty() {
            return Err(AzqrError::Rule {
                rule_id: "-".into(),
                message: "rule table is empty".into(),
            });
        }
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(AzqrError::Rule {
                    rule_id: rule.id.clone(),
                    message: "duplicate rule id".into(),
                });
            }
        }
        Ok(Self { rules })
    }

    pub fn get(&self, id: &str) -> Option<&Rule<T>> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule<T>> {
        self.rules.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn metadata(&self) -> Vec<RuleMetadata> {
        self.rules.iter().map(Rule::metadata).collect()
    }
}

/// The rule engine evaluates a rule table against one resource.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// One entry per rule in `table`; rules are independent of each other.
    pub fn evaluate<T>(
        &self,
        table: &RuleTable<T>,
        target: &T,
        ctx: &ScanContext,
    ) -> BTreeMap<String, RuleResult> {
        table
            .iter()
            .map(|rule| (rule.id.clone(), rule.eval(target, ctx)))
            .collect()
    }
}
