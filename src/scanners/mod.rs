//! Per-resource-kind scanners.
//!
//! Every kind shares one driver, [`ServiceScanner`]; a kind only supplies its
//! descriptor type, ARM provider path and rule table via [`ResourceKind`].
//! The set of kinds is closed: add a variant to [`ScannerKind`] to add one.

pub mod ci;
pub mod cosmos;
pub mod kv;
pub mod sigr;
pub mod st;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::arm::{ArmClient, ArmDiagnostics, ArmLister, ClientOptions, Credential};
use crate::cancel::CancelToken;
use crate::context::ScanContext;
use crate::diagnostics::DiagnosticsProvider;
use crate::error::{AzqrError, Result};
use crate::paging::{collect_pages, ResourceLister};
use crate::resource::AzureResource;
use crate::retry::RetryPolicy;
use crate::rules::common::DIAGNOSTIC_SETTINGS;
use crate::rules::{Rule, RuleEngine, RuleMetadata, RuleTable, ScanResult};

/// Everything a scanner needs from the bootstrap layer.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub subscription_id: String,
    pub credential: Option<Credential>,
    pub cancel: CancelToken,
    pub client: ClientOptions,
    pub retry: RetryPolicy,
    /// Abort a resource-group scan when a diagnostics lookup fails.
    pub strict_diagnostics: bool,
}

impl ScannerConfig {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            credential: None,
            cancel: CancelToken::new(),
            client: ClientOptions::default(),
            retry: RetryPolicy::default(),
            strict_diagnostics: false,
        }
    }
}

/// The capability set the orchestrator drives.
#[async_trait]
pub trait ResourceScanner: Send + Sync {
    fn kind(&self) -> ScannerKind;

    /// Construct clients and the rule table. Must succeed before `scan`.
    fn init(&mut self, config: &ScannerConfig) -> Result<()>;

    /// Scan every resource of this kind in `resource_group`.
    async fn scan(&self, resource_group: &str, ctx: &ScanContext) -> Result<Vec<ScanResult>>;
}

/// Static description of one resource kind.
pub trait ResourceKind: Send + Sync + 'static {
    type Resource: AzureResource;

    const KIND: ScannerKind;
    /// ARM provider path, e.g. `Microsoft.KeyVault/vaults`.
    const PROVIDER: &'static str;
    const API_VERSION: &'static str;

    fn rules() -> Vec<Rule<Self::Resource>>;

    fn table() -> Result<RuleTable<Self::Resource>> {
        RuleTable::new(Self::rules())
    }
}

struct Ready<R> {
    config: ScannerConfig,
    rules: RuleTable<R>,
    lister: Arc<dyn ResourceLister<R>>,
    diagnostics: Arc<dyn DiagnosticsProvider>,
}

/// Generic scanner driving listing, diagnostics lookup, and the rule engine.
pub struct ServiceScanner<K: ResourceKind> {
    lister: Option<Arc<dyn ResourceLister<K::Resource>>>,
    diagnostics: Option<Arc<dyn DiagnosticsProvider>>,
    ready: Option<Ready<K::Resource>>,
}

impl<K: ResourceKind> ServiceScanner<K> {
    pub fn new() -> Self {
        Self {
            lister: None,
            diagnostics: None,
            ready: None,
        }
    }

    /// Replace the ARM listing call.
    pub fn with_lister(mut self, lister: Arc<dyn ResourceLister<K::Resource>>) -> Self {
        self.lister = Some(lister);
        self
    }

    /// Replace the ARM diagnostics lookup.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsProvider>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    fn init_error(e: AzqrError) -> AzqrError {
        AzqrError::Init {
            scanner: K::KIND.to_string(),
            message: e.to_string(),
        }
    }
}

impl<K: ResourceKind> Default for ServiceScanner<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: ResourceKind> ResourceScanner for ServiceScanner<K> {
    fn kind(&self) -> ScannerKind {
        K::KIND
    }

    fn init(&mut self, config: &ScannerConfig) -> Result<()> {
        let rules = K::table().map_err(Self::init_error)?;

        let (lister, diagnostics) = match (self.lister.clone(), self.diagnostics.clone()) {
            (Some(lister), Some(diagnostics)) => (lister, diagnostics),
            (lister, diagnostics) => {
                let client = Arc::new(
                    ArmClient::new(
                        &config.subscription_id,
                        config.credential.as_ref(),
                        &config.client,
                    )
                    .map_err(Self::init_error)?,
                );
                let lister = lister.unwrap_or_else(|| {
                    Arc::new(ArmLister::new(
                        Arc::clone(&client),
                        K::PROVIDER,
                        K::API_VERSION,
                    ))
                });
                let diagnostics = diagnostics
                    .unwrap_or_else(|| Arc::new(ArmDiagnostics::new(Arc::clone(&client))));
                (lister, diagnostics)
            }
        };

        self.ready = Some(Ready {
            config: config.clone(),
            rules,
            lister,
            diagnostics,
        });
        Ok(())
    }

    async fn scan(&self, resource_group: &str, ctx: &ScanContext) -> Result<Vec<ScanResult>> {
        let ready = self
            .ready
            .as_ref()
            .ok_or_else(|| AzqrError::NotInitialized(K::KIND.to_string()))?;
        let config = &ready.config;

        info!(kind = %K::KIND, resource_group, "scanning resource group");

        let mut pager = ready.lister.pager(resource_group)?;
        let resources = collect_pages(pager.as_mut(), &config.retry, &config.cancel).await?;

        let check_diagnostics = ready.rules.contains(DIAGNOSTIC_SETTINGS);
        let engine = RuleEngine::new();
        let mut results = Vec::with_capacity(resources.len());

        for resource in &resources {
            if check_diagnostics {
                if let Some(id) = resource.id() {
                    ctx.resolve_diagnostics(
                        ready.diagnostics.as_ref(),
                        id,
                        &config.retry,
                        &config.cancel,
                        config.strict_diagnostics,
                    )
                    .await?;
                }
            }
            let rules = engine.evaluate(&ready.rules, resource, ctx);
            results.push(ScanResult::new(
                &config.subscription_id,
                resource_group,
                resource,
                rules,
            ));
        }

        info!(
            kind = %K::KIND,
            resource_group,
            resources = results.len(),
            "resource group scanned"
        );
        Ok(results)
    }
}

/// The closed set of supported resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScannerKind {
    #[serde(rename = "kv")]
    KeyVault,
    #[serde(rename = "sigr")]
    SignalR,
    #[serde(rename = "cosmos")]
    CosmosDb,
    #[serde(rename = "st")]
    Storage,
    #[serde(rename = "ci")]
    ContainerInstance,
}

impl ScannerKind {
    pub const ALL: [ScannerKind; 5] = [
        Self::KeyVault,
        Self::SignalR,
        Self::CosmosDb,
        Self::Storage,
        Self::ContainerInstance,
    ];

    /// Short code used on the command line and in config.
    pub fn code(self) -> &'static str {
        match self {
            Self::KeyVault => "kv",
            Self::SignalR => "sigr",
            Self::CosmosDb => "cosmos",
            Self::Storage => "st",
            Self::ContainerInstance => "ci",
        }
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "kv" | "keyvault" | "key-vault" => Some(Self::KeyVault),
            "sigr" | "signalr" => Some(Self::SignalR),
            "cosmos" | "cosmosdb" => Some(Self::CosmosDb),
            "st" | "storage" => Some(Self::Storage),
            "ci" | "aci" | "containerinstance" => Some(Self::ContainerInstance),
            _ => None,
        }
    }

    /// A production scanner for this kind (ARM wiring happens in `init`).
    pub fn build(self) -> Box<dyn ResourceScanner> {
        match self {
            Self::KeyVault => Box::new(kv::KeyVaultScanner::new()),
            Self::SignalR => Box::new(sigr::SignalRScanner::new()),
            Self::CosmosDb => Box::new(cosmos::CosmosDbScanner::new()),
            Self::Storage => Box::new(st::StorageScanner::new()),
            Self::ContainerInstance => Box::new(ci::ContainerInstanceScanner::new()),
        }
    }

    pub fn rule_metadata(self) -> Result<Vec<RuleMetadata>> {
        Ok(match self {
            Self::KeyVault => kv::KeyVault::table()?.metadata(),
            Self::SignalR => sigr::SignalR::table()?.metadata(),
            Self::CosmosDb => cosmos::CosmosDb::table()?.metadata(),
            Self::Storage => st::Storage::table()?.metadata(),
            Self::ContainerInstance => ci::ContainerInstance::table()?.metadata(),
        })
    }
}

impl fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyVault => write!(f, "Key Vault"),
            Self::SignalR => write!(f, "SignalR"),
            Self::CosmosDb => write!(f, "Cosmos DB"),
            Self::Storage => write!(f, "Storage"),
            Self::ContainerInstance => write!(f, "Container Instances"),
        }
    }
}
