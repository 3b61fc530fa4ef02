use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arm::ClientOptions;
use crate::error::{AzqrError, Result};
use crate::retry::RetryPolicy;
use crate::rules::policy::Policy;

pub const DEFAULT_CONFIG_FILE: &str = ".azqr.toml";

/// Top-level configuration from `.azqr.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub client: ClientOptions,
    #[serde(default)]
    pub policy: Policy,
}

/// The `[scan]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Maximum number of (scanner, resource group) jobs in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Fail a resource group when its diagnostics lookup fails.
    #[serde(default)]
    pub strict_diagnostics: bool,
}

fn default_concurrency() -> usize {
    4
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            strict_diagnostics: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scan.concurrency == 0 {
            return Err(AzqrError::Config("scan.concurrency must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(AzqrError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.client.timeout_secs == 0 {
            return Err(AzqrError::Config("client.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# azqr configuration

[scan]
# Maximum number of scanner jobs running at once.
concurrency = 4
# Fail a resource group when diagnostic settings cannot be read.
strict_diagnostics = false

[retry]
# Transient errors (429, 5xx, network) are retried with jittered backoff.
max_retries = 3
base_delay_ms = 500
max_delay_ms = 30000

[client]
endpoint = "https://management.azure.com"
timeout_secs = 30

[policy]
# Exit non-zero when any check is broken.
fail_on_broken = false

# Rule IDs to drop from results.
# ignore_rules = ["CAF", "kv-009"]
"#
    }
}
