//! azqr: Azure resource best-practice scanner.
//!
//! Lists resources of each supported kind per resource group through Azure
//! Resource Manager, evaluates a fixed rule table against every resource,
//! and reports one [`ScanResult`](rules::ScanResult) per resource.
//!
//! # Quick Start
//!
//! ```no_run
//! use azqr::arm::Credential;
//! use azqr::{scan, ScanOptions};
//!
//! # async fn run() -> azqr::error::Result<()> {
//! let mut options = ScanOptions::new("00000000-0000-0000-0000-000000000000");
//! options.credential = Some(Credential::from_env()?);
//! options.resource_groups = vec!["rg-app".into()];
//! let report = scan(&options).await?;
//! println!("Pass: {}, Resources: {}", report.verdict.pass, report.results.len());
//! # Ok(())
//! # }
//! ```

pub mod arm;
pub mod cancel;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod paging;
pub mod resource;
pub mod retry;
pub mod rules;
pub mod scanners;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use arm::Credential;
use cancel::CancelToken;
use config::{Config, DEFAULT_CONFIG_FILE};
use context::ScanContext;
use error::{AzqrError, Result};
use output::OutputFormat;
use rules::policy::PolicyVerdict;
use rules::ScanResult;
use scanners::{ResourceScanner, ScannerConfig, ScannerKind};

/// Options for a scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Path to config file (defaults to `.azqr.toml` in the working directory).
    pub config_path: Option<PathBuf>,
    pub subscription_id: String,
    pub credential: Option<Credential>,
    pub resource_groups: Vec<String>,
    /// Kinds to scan; empty means every kind.
    pub kinds: Vec<ScannerKind>,
    /// CLI override for `scan.concurrency`.
    pub concurrency_override: Option<usize>,
    pub cancel: CancelToken,
}

impl ScanOptions {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            config_path: None,
            subscription_id: subscription_id.into(),
            credential: None,
            resource_groups: Vec::new(),
            kinds: Vec::new(),
            concurrency_override: None,
            cancel: CancelToken::new(),
        }
    }
}

/// A scanner that failed to initialize, or one (scanner, resource group) job that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannerFailure {
    pub scanner: String,
    /// `None` when the scanner never got past `init`.
    pub resource_group: Option<String>,
    pub error: String,
}

/// Raw output of [`run_scanners`], before policy is applied.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub results: Vec<ScanResult>,
    pub failures: Vec<ScannerFailure>,
}

/// Complete scan report.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub subscription_id: String,
    pub results: Vec<ScanResult>,
    pub failures: Vec<ScannerFailure>,
    pub verdict: PolicyVerdict,
}

/// Initialize `scanners` and run one job per (scanner, resource group), at
/// most `concurrency` at a time. A failing scanner or job is recorded and the
/// others still deliver results. Results are sorted by type, group and name.
pub async fn run_scanners(
    scanners: Vec<Box<dyn ResourceScanner>>,
    config: &ScannerConfig,
    resource_groups: &[String],
    concurrency: usize,
    ctx: Arc<ScanContext>,
) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();

    let mut ready: Vec<Arc<dyn ResourceScanner>> = Vec::with_capacity(scanners.len());
    for mut scanner in scanners {
        let kind = scanner.kind();
        match scanner.init(config) {
            Ok(()) => ready.push(Arc::from(scanner)),
            Err(e) => {
                warn!(kind = %kind, error = %e, "scanner initialization failed");
                outcome.failures.push(ScannerFailure {
                    scanner: kind.code().to_string(),
                    resource_group: None,
                    error: e.to_string(),
                });
            }
        }
    }

    let resource_groups = unique_resource_groups(resource_groups);
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();

    for scanner in &ready {
        for resource_group in &resource_groups {
            let permit = config
                .cancel
                .guard(async {
                    Arc::clone(&sem)
                        .acquire_owned()
                        .await
                        .map_err(|_| AzqrError::Cancelled)
                })
                .await?;
            let scanner = Arc::clone(scanner);
            let ctx = Arc::clone(&ctx);
            let resource_group = resource_group.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let res = scanner.scan(&resource_group, &ctx).await;
                (scanner.kind(), resource_group, res)
            });
        }
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((_, _, Ok(results))) => outcome.results.extend(results),
            Ok((_, _, Err(AzqrError::Cancelled))) => return Err(AzqrError::Cancelled),
            Ok((kind, resource_group, Err(e))) => {
                warn!(
                    kind = %kind,
                    resource_group = %resource_group,
                    error = %e,
                    "scan job failed"
                );
                outcome.failures.push(ScannerFailure {
                    scanner: kind.code().to_string(),
                    resource_group: Some(resource_group),
                    error: e.to_string(),
                });
            }
            Err(e) => outcome.failures.push(ScannerFailure {
                scanner: "unknown".into(),
                resource_group: None,
                error: format!("join error: {e}"),
            }),
        }
    }

    if config.cancel.is_cancelled() {
        return Err(AzqrError::Cancelled);
    }

    outcome.results.sort_by(|a, b| {
        (&a.resource_type, &a.resource_group, &a.service_name).cmp(&(
            &b.resource_type,
            &b.resource_group,
            &b.service_name,
        ))
    });
    Ok(outcome)
}

/// Resource group names are case-insensitive in ARM; keep the first spelling of each.
fn unique_resource_groups(resource_groups: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    resource_groups
        .iter()
        .filter(|rg| seen.insert(rg.to_lowercase()))
        .cloned()
        .collect()
}

/// Run a complete scan: load config, build scanners, run them, evaluate policy.
pub async fn scan(options: &ScanOptions) -> Result<ScanReport> {
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = Config::load(&config_path)?;

    if options.subscription_id.trim().is_empty() {
        return Err(AzqrError::Config("no subscription id given".into()));
    }
    if options.resource_groups.is_empty() {
        return Err(AzqrError::Config("no resource groups given".into()));
    }

    let scanner_config = ScannerConfig {
        subscription_id: options.subscription_id.clone(),
        credential: options.credential.clone(),
        cancel: options.cancel.clone(),
        client: config.client.clone(),
        retry: config.retry.clone(),
        strict_diagnostics: config.scan.strict_diagnostics,
    };

    let mut kinds = if options.kinds.is_empty() {
        ScannerKind::ALL.to_vec()
    } else {
        options.kinds.clone()
    };
    kinds.sort_unstable();
    kinds.dedup();
    let resource_groups = unique_resource_groups(&options.resource_groups);
    let scanners = kinds.iter().map(|k| k.build()).collect();
    let concurrency = options
        .concurrency_override
        .unwrap_or(config.scan.concurrency);

    let ctx = Arc::new(ScanContext::new());
    info!(
        run_id = %ctx.run_id(),
        subscription_id = %options.subscription_id,
        kinds = kinds.len(),
        resource_groups = resource_groups.len(),
        "starting scan"
    );

    let outcome = run_scanners(
        scanners,
        &scanner_config,
        &resource_groups,
        concurrency,
        Arc::clone(&ctx),
    )
    .await?;

    let report = build_report(&config, &ctx, &options.subscription_id, outcome);
    info!(
        run_id = %report.run_id,
        resources = report.verdict.total_resources,
        broken = report.verdict.broken_checks,
        failed = report.verdict.failed_scanners,
        "scan finished"
    );
    Ok(report)
}

fn build_report(
    config: &Config,
    ctx: &ScanContext,
    subscription_id: &str,
    outcome: ScanOutcome,
) -> ScanReport {
    let verdict = config
        .policy
        .evaluate(&outcome.results, outcome.failures.len());
    let results = config.policy.apply(&outcome.results);
    ScanReport {
        run_id: ctx.run_id(),
        started_at: ctx.started_at(),
        subscription_id: subscription_id.to_string(),
        results,
        failures: outcome.failures,
        verdict,
    }
}

/// Render a scan report in the specified format.
pub fn render_report(report: &ScanReport, format: OutputFormat) -> Result<String> {
    output::render(report, format)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::resource::Sku;
    use crate::retry::RetryPolicy;
    use crate::scanners::kv::{KeyVault, Vault};
    use crate::scanners::sigr::{SignalR, SignalRResource};
    use crate::scanners::ServiceScanner;
    use crate::testing::{PendingLister, StaticLister, StubDiagnostics};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn scanner_config() -> ScannerConfig {
        let mut config = ScannerConfig::new("sub-1");
        config.retry = RetryPolicy {
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 2,
        };
        config
    }

    fn vault(name: &str) -> Vault {
        Vault {
            id: Some(format!("/subscriptions/sub-1/providers/Microsoft.KeyVault/vaults/{name}")),
            name: Some(name.into()),
            resource_type: Some("Microsoft.KeyVault/vaults".into()),
            ..Default::default()
        }
    }

    fn signalr(name: &str) -> SignalRResource {
        SignalRResource {
            id: Some(format!(
                "/subscriptions/sub-1/providers/Microsoft.SignalRService/signalR/{name}"
            )),
            name: Some(name.into()),
            resource_type: Some("Microsoft.SignalRService/signalR".into()),
            sku: Some(Sku {
                name: Some("Premium_P1".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn kv_scanner(names: &[&str]) -> Box<dyn ResourceScanner> {
        let vaults = names.iter().map(|n| vault(n)).collect();
        Box::new(
            ServiceScanner::<KeyVault>::new()
                .with_lister(Arc::new(StaticLister::new(vec![vaults])))
                .with_diagnostics(Arc::new(StubDiagnostics::always(true))),
        )
    }

    fn rgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn one_failing_scanner_does_not_hide_the_others() {
        let failing = Box::new(
            ServiceScanner::<SignalR>::new()
                .with_lister(Arc::new(
                    StaticLister::new(vec![vec![signalr("sigr-a")]]).fail_page(
                        0,
                        || AzqrError::Unauthorized {
                            status: 403,
                            message: "forbidden".into(),
                        },
                        usize::MAX,
                    ),
                ))
                .with_diagnostics(Arc::new(StubDiagnostics::always(true))),
        );
        let scanners: Vec<Box<dyn ResourceScanner>> = vec![kv_scanner(&["kv-a"]), failing];

        let outcome = run_scanners(
            scanners,
            &scanner_config(),
            &rgs(&["rg-app"]),
            2,
            Arc::new(ScanContext::new()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].service_name, "kv-a");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].scanner, "sigr");
        assert_eq!(outcome.failures[0].resource_group.as_deref(), Some("rg-app"));
    }

    #[tokio::test]
    async fn init_failure_skips_only_that_scanner() {
        // No injected clients and no credential, so init cannot build an ARM client.
        let scanners: Vec<Box<dyn ResourceScanner>> = vec![
            Box::new(ServiceScanner::<SignalR>::new()),
            kv_scanner(&["kv-a"]),
        ];
        let outcome = run_scanners(
            scanners,
            &scanner_config(),
            &rgs(&["rg-app", "rg-data"]),
            4,
            Arc::new(ScanContext::new()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].resource_group, None);
        assert!(outcome.failures[0].error.contains("initialization failed"));
    }

    #[tokio::test]
    async fn results_are_sorted() {
        let outcome = run_scanners(
            vec![kv_scanner(&["kv-b", "kv-a"])],
            &scanner_config(),
            &rgs(&["rg-z", "rg-a"]),
            2,
            Arc::new(ScanContext::new()),
        )
        .await
        .unwrap();

        let keys: Vec<_> = outcome
            .results
            .iter()
            .map(|r| (r.resource_group.as_str(), r.service_name.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("rg-a", "kv-a"), ("rg-a", "kv-b"), ("rg-z", "kv-a"), ("rg-z", "kv-b")]
        );
    }

    /// Records the peak number of concurrent `scan` calls.
    struct SlowScanner {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ResourceScanner for SlowScanner {
        fn kind(&self) -> ScannerKind {
            ScannerKind::Storage
        }

        fn init(&mut self, _config: &ScannerConfig) -> Result<()> {
            Ok(())
        }

        async fn scan(&self, _resource_group: &str, _ctx: &ScanContext) -> Result<Vec<ScanResult>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let scanners: Vec<Box<dyn ResourceScanner>> = (0..3)
            .map(|_| {
                Box::new(SlowScanner {
                    in_flight: Arc::clone(&in_flight),
                    peak: Arc::clone(&peak),
                }) as Box<dyn ResourceScanner>
            })
            .collect();

        run_scanners(
            scanners,
            &scanner_config(),
            &rgs(&["rg-1", "rg-2", "rg-3"]),
            2,
            Arc::new(ScanContext::new()),
        )
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn cancellation_fails_the_run() {
        let config = scanner_config();
        let scanners: Vec<Box<dyn ResourceScanner>> = vec![Box::new(
            ServiceScanner::<KeyVault>::new()
                .with_lister(Arc::new(PendingLister))
                .with_diagnostics(Arc::new(StubDiagnostics::always(true))),
        )];
        let cancel = config.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        let res = run_scanners(
            scanners,
            &config,
            &rgs(&["rg-app"]),
            1,
            Arc::new(ScanContext::new()),
        )
        .await;
        assert!(matches!(res, Err(AzqrError::Cancelled)));
    }

    #[tokio::test]
    async fn diagnostics_are_resolved_once_per_run() {
        let diagnostics = Arc::new(StubDiagnostics::always(false));
        let scanner = Box::new(
            ServiceScanner::<KeyVault>::new()
                .with_lister(Arc::new(StaticLister::new(vec![vec![vault("kv-a")]])))
                .with_diagnostics(diagnostics.clone()),
        );
        // The same vault shows up in both groups; its lookup is shared.
        let outcome = run_scanners(
            vec![scanner],
            &scanner_config(),
            &rgs(&["rg-1", "rg-2"]),
            1,
            Arc::new(ScanContext::new()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(diagnostics.calls(), 1);
        assert!(outcome.results.iter().all(|r| r.rules["DiagnosticSettings"].broken));
    }

    #[test]
    fn report_applies_policy() {
        let mut config = Config::default();
        config.policy.ignore_rules.insert("CAF".into());
        config.policy.fail_on_broken = true;

        let ctx = ScanContext::new();
        let mut result = ScanResult::new("sub-1", "rg-app", &vault("vault-a"), Default::default());
        result.rules.insert("CAF".into(), rules::RuleResult::broken(""));
        result.rules.insert("SLA".into(), rules::RuleResult::pass_with("99.99%"));

        let report = build_report(
            &config,
            &ctx,
            "sub-1",
            ScanOutcome {
                results: vec![result],
                failures: Vec::new(),
            },
        );
        assert!(report.verdict.pass);
        assert_eq!(report.verdict.total_checks, 1);
        assert!(!report.results[0].rules.contains_key("CAF"));
        assert_eq!(report.run_id, ctx.run_id());
    }

    #[tokio::test]
    async fn scan_requires_resource_groups() {
        let mut options = ScanOptions::new("sub-1");
        options.config_path = Some(PathBuf::from("does-not-exist.toml"));
        assert!(matches!(scan(&options).await, Err(AzqrError::Config(_))));
    }

    #[tokio::test]
    async fn scan_against_mock_arm() {
        use serde_json::json;
        use wiremock::matchers::{method, path, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.KeyVault/vaults",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "id": "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.KeyVault/vaults/kv-prod",
                    "name": "kv-prod",
                    "type": "Microsoft.KeyVault/vaults",
                    "location": "westeurope",
                    "properties": {"sku": {"family": "A", "name": "standard"}, "enableSoftDelete": false}
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"/diagnosticSettings$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"value": [{"name": "to-law"}]})),
            )
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[client]\nendpoint = \"{}\"\n\n[retry]\nmax_retries = 0\nbase_delay_ms = 1\nmax_delay_ms = 1\n\n[policy]\nfail_on_broken = true",
            server.uri()
        )
        .unwrap();

        let mut options = ScanOptions::new("sub-1");
        options.config_path = Some(file.path().to_path_buf());
        options.credential = Some(Credential::new("test-token"));
        options.resource_groups = vec!["rg-app".into()];
        options.kinds = vec![ScannerKind::KeyVault];

        let report = scan(&options).await.unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(report.failures.is_empty());

        let rules = &report.results[0].rules;
        assert!(!rules["DiagnosticSettings"].broken);
        assert_eq!(rules["SKU"].detail, "standard");
        assert!(rules["kv-008"].broken);
        assert!(!report.verdict.pass);

        let json = render_report(&report, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["results"][0]["service_name"], "kv-prod");
    }

    #[tokio::test]
    async fn repeated_resource_groups_scan_once() {
        let outcome = run_scanners(
            vec![kv_scanner(&["kv-a"])],
            &scanner_config(),
            &rgs(&["rg-app", "RG-App", "rg-app"]),
            2,
            Arc::new(ScanContext::new()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].resource_group, "rg-app");
    }

    #[tokio::test]
    async fn repeated_kinds_and_groups_report_each_resource_once() {
        use serde_json::json;
        use wiremock::matchers::{method, path, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.KeyVault/vaults",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "id": "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.KeyVault/vaults/kv-prod",
                    "name": "kv-prod",
                    "type": "Microsoft.KeyVault/vaults"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"/diagnosticSettings$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[client]\nendpoint = \"{}\"", server.uri()).unwrap();

        let mut options = ScanOptions::new("sub-1");
        options.config_path = Some(file.path().to_path_buf());
        options.credential = Some(Credential::new("test-token"));
        options.resource_groups = vec!["rg-app".into(), "rg-app".into()];
        options.kinds = vec![ScannerKind::KeyVault, ScannerKind::KeyVault];

        let report = scan(&options).await.unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.verdict.total_resources, 1);
        assert!(report.results[0].rules["DiagnosticSettings"].broken);
    }
}
