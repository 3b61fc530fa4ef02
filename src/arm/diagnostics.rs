use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::ArmClient;
use crate::diagnostics::DiagnosticsProvider;
use crate::error::Result;

#[derive(Deserialize)]
struct DiagnosticSettingsList {
    #[serde(default)]
    value: Vec<serde_json::Value>,
}

/// Queries `Microsoft.Insights/diagnosticSettings` for a resource.
#[derive(Debug, Clone)]
pub struct ArmDiagnostics {
    client: Arc<ArmClient>,
}

impl ArmDiagnostics {
    pub fn new(client: Arc<ArmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiagnosticsProvider for ArmDiagnostics {
    async fn has_diagnostics(&self, resource_id: &str) -> Result<bool> {
        let url = self.client.diagnostics_url(resource_id)?;
        let list: DiagnosticSettingsList = self.client.get_json(url.as_str()).await?;
        Ok(!list.value.is_empty())
    }
}
