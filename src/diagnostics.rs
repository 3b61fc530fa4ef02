//! The diagnostics capability: does a resource route logs/metrics anywhere?

use async_trait::async_trait;

use crate::error::Result;

/// Answers whether a resource has diagnostic settings configured.
///
/// "Nothing configured" is `Ok(false)`. `Err` is reserved for control-plane
/// failures. Production wiring is [`crate::arm::ArmDiagnostics`]; tests inject stubs.
#[async_trait]
pub trait DiagnosticsProvider: Send + Sync {
    async fn has_diagnostics(&self, resource_id: &str) -> Result<bool>;
}
