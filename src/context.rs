//! Per-run state shared by every rule evaluation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::warn;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::diagnostics::DiagnosticsProvider;
use crate::error::{AzqrError, Result};
use crate::retry::RetryPolicy;

/// Resolved diagnostics state for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticsStatus {
    Enabled,
    Disabled,
    /// The lookup failed; the reason is surfaced in the rule detail.
    Unknown(String),
}

type DiagnosticsCell = Arc<OnceCell<DiagnosticsStatus>>;

/// Scan Context: created once per run, read-only to rules.
///
/// Owns the diagnostics cache, so lookups are memoized for this run only.
/// Concurrent lookups of the same resource id share one in-flight request.
#[derive(Debug)]
pub struct ScanContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    diagnostics: Mutex<HashMap<String, DiagnosticsCell>>,
}

impl ScanContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            diagnostics: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Status resolved earlier in this run, if any.
    pub fn diagnostics_status(&self, resource_id: &str) -> Option<DiagnosticsStatus> {
        let entries = self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&cache_key(resource_id))
            .and_then(|cell| cell.get().cloned())
    }

    /// Preload a status (orchestrator side, between scanner invocations).
    pub fn record_diagnostics(&self, resource_id: &str, status: DiagnosticsStatus) {
        let mut entries = self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            cache_key(resource_id),
            Arc::new(OnceCell::new_with(Some(status))),
        );
    }

    /// Number of resource ids with a cached status.
    pub fn cached_diagnostics(&self) -> usize {
        let entries = self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|cell| cell.initialized()).count()
    }

    /// Look up diagnostics for `resource_id` through `provider`, at most once per run.
    ///
    /// Transient failures are retried per `retry`. Once retries are exhausted the
    /// failure is cached as [`DiagnosticsStatus::Unknown`], or returned as an error
    /// when `strict` is set. Cancellation is always an error.
    pub async fn resolve_diagnostics(
        &self,
        provider: &dyn DiagnosticsProvider,
        resource_id: &str,
        retry: &RetryPolicy,
        cancel: &CancelToken,
        strict: bool,
    ) -> Result<DiagnosticsStatus> {
        let cell = self.cell(resource_id);
        let status = cell
            .get_or_try_init(|| async {
                let mut backoff = retry.backoff();
                loop {
                    let err = match cancel.guard(provider.has_diagnostics(resource_id)).await {
                        Ok(true) => return Ok(DiagnosticsStatus::Enabled),
                        Ok(false) => return Ok(DiagnosticsStatus::Disabled),
                        Err(e) => e,
                    };
                    match backoff.wait_or_fail(err, cancel).await {
                        Ok(()) => continue,
                        Err(AzqrError::Cancelled) => return Err(AzqrError::Cancelled),
                        Err(e) if strict => return Err(e),
                        Err(e) => {
                            warn!(resource_id, error = %e, "diagnostics lookup failed");
                            return Ok(DiagnosticsStatus::Unknown(e.to_string()));
                        }
                    }
                }
            })
            .await?;
        Ok(status.clone())
    }

    fn cell(&self, resource_id: &str) -> DiagnosticsCell {
        let mut entries = self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner);
        entries.entry(cache_key(resource_id)).or_default().clone()
    }
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new()
    }
}

/// ARM resource ids are case-insensitive.
fn cache_key(resource_id: &str) -> String {
    resource_id.to_ascii_lowercase()
}
