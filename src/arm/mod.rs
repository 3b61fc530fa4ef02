//! Azure Resource Manager REST client.
//!
//! This is the only place that interprets HTTP status codes; everything
//! above it deals in [`AzqrError`] variants.

mod diagnostics;
mod lister;

use std::fmt;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AzqrError, Result};

pub use diagnostics::ArmDiagnostics;
pub use lister::{ArmLister, ArmPager};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DIAGNOSTICS_API_VERSION: &str = "2021-05-01-preview";

/// Opaque bearer credential handle. Token acquisition happens elsewhere.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read `AZURE_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self> {
        match std::env::var("AZURE_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(token.trim())),
            _ => Err(AzqrError::Config(
                "AZURE_ACCESS_TOKEN is not set; obtain one with `az account get-access-token`"
                    .into(),
            )),
        }
    }

    fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// HTTP client options, loaded from the `[client]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOptions {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    credential: Credential,
}

impl ArmClient {
    pub fn new(
        subscription_id: &str,
        credential: Option<&Credential>,
        options: &ClientOptions,
    ) -> Result<Self> {
        if subscription_id.trim().is_empty() {
            return Err(AzqrError::Config("subscription id is empty".into()));
        }
        let credential = credential
            .cloned()
            .ok_or_else(|| AzqrError::Config("no credential supplied".into()))?;
        Url::parse(&options.endpoint).map_err(|e| {
            AzqrError::Config(format!("invalid endpoint '{}': {e}", options.endpoint))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .user_agent(concat!("azqr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AzqrError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: options.endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.to_string(),
            credential,
        })
    }

    /// `GET …/resourceGroups/{rg}/providers/{provider}` listing URL.
    pub fn resource_group_url(
        &self,
        resource_group: &str,
        provider: &str,
        api_version: &str,
    ) -> Result<Url> {
        self.url(
            &format!(
                "/subscriptions/{}/resourceGroups/{}/providers/{}",
                self.subscription_id, resource_group, provider
            ),
            api_version,
        )
    }

    pub fn diagnostics_url(&self, resource_id: &str) -> Result<Url> {
        let resource_id = resource_id.trim_end_matches('/');
        let resource_id = if resource_id.starts_with('/') {
            resource_id.to_string()
        } else {
            format!("/{resource_id}")
        };
        self.url(
            &format!("{resource_id}/providers/Microsoft.Insights/diagnosticSettings"),
            DIAGNOSTICS_API_VERSION,
        )
    }

    fn url(&self, path: &str, api_version: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.endpoint, path))
            .map_err(|e| AzqrError::Config(format!("invalid request path '{path}': {e}")))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// Single authenticated GET, decoded as JSON. No retry at this layer.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(self.credential.token())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| AzqrError::InvalidResponse(e.to_string()));
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, retry_after, &body, url))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) if !env.error.code.is_empty() => {
            format!("{}: {}", env.error.code, env.error.message)
        }
        Ok(env) => env.error.message,
        Err(_) => body.chars().take(200).collect(),
    }
}

fn classify(status: StatusCode, retry_after: Option<Duration>, body: &str, url: &str) -> AzqrError {
    let message = error_message(body);
    match status.as_u16() {
        401 | 403 => AzqrError::Unauthorized {
            status: status.as_u16(),
            message,
        },
        404 => AzqrError::NotFound(url.to_string()),
        429 => AzqrError::Throttled { retry_after },
        408 => AzqrError::Network(format!("request timeout: {message}")),
        500..=599 => AzqrError::Service {
            status: status.as_u16(),
            message,
        },
        code => AzqrError::Api {
            status: code,
            message,
        },
    }
}
