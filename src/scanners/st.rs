//! Storage accounts.

use serde::{Deserialize, Serialize};

use super::{ResourceKind, ScannerKind, ServiceScanner};
use crate::context::ScanContext;
use crate::resource::{has_private_endpoint, PrivateEndpointConnection, Resource};
use crate::rules::{common, Category, Rule, RuleResult};

pub type StorageAccount = Resource<StorageAccountProperties>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountProperties {
    pub access_tier: Option<String>,
    pub supports_https_traffic_only: Option<bool>,
    pub minimum_tls_version: Option<String>,
    pub private_endpoint_connections: Option<Vec<PrivateEndpointConnection>>,
}

pub struct Storage;

pub type StorageScanner = ServiceScanner<Storage>;

const MIN_TLS: &str = "TLS1_2";

fn sku_name(a: &StorageAccount) -> Option<&str> {
    a.sku_name()
}

fn sla(a: &StorageAccount) -> &'static str {
    let read_access = a
        .sku_name()
        .is_some_and(|s| s.contains("RAGRS") || s.contains("RAGZRS"));
    let cool = a
        .props()
        .and_then(|p| p.access_tier.as_deref())
        .is_some_and(|t| t.eq_ignore_ascii_case("Cool"));
    match (read_access, cool) {
        (true, false) => "99.99%",
        (true, true) | (false, false) => "99.9%",
        (false, true) => "99%",
    }
}

/// TLS versions are `TLS1_0`, `TLS1_1`, `TLS1_2`, ...; they order lexically.
fn min_tls_rule() -> Rule<StorageAccount> {
    Rule::new(
        "st-009",
        Category::Security,
        "Storage Account should enforce TLS >= 1.2",
        "https://learn.microsoft.com/en-us/azure/storage/common/transport-layer-security-configure-minimum-version",
        |a: &StorageAccount, _ctx: &ScanContext| {
            match a.props().and_then(|p| p.minimum_tls_version.as_deref()) {
                Some(v) => RuleResult::new(v < MIN_TLS, v),
                None => RuleResult::not_applicable("minimum TLS version"),
            }
        },
    )
}

impl ResourceKind for Storage {
    type Resource = StorageAccount;

    const KIND: ScannerKind = ScannerKind::Storage;
    const PROVIDER: &'static str = "Microsoft.Storage/storageAccounts";
    const API_VERSION: &'static str = "2023-01-01";

    fn rules() -> Vec<Rule<StorageAccount>> {
        vec![
            common::diagnostic_settings(
                "Storage should have diagnostic settings enabled",
                "https://learn.microsoft.com/en-us/azure/storage/blobs/monitor-blob-storage",
            ),
            common::availability_zones(
                "Storage should have availability zones enabled",
                "https://learn.microsoft.com/EN-US/azure/reliability/migrate-storage",
                |a: &StorageAccount| a.sku_name().map(|s| s.contains("ZRS")),
            ),
            common::sla(
                "Storage should have a SLA",
                "https://www.azure.cn/en-us/support/sla/storage/",
                sla,
            ),
            common::private_endpoint(
                "Storage should have private endpoints enabled",
                "https://learn.microsoft.com/en-us/azure/storage/common/storage-private-endpoints",
                |a: &StorageAccount| {
                    has_private_endpoint(
                        a.props()
                            .and_then(|p| p.private_endpoint_connections.as_ref()),
                    )
                },
            ),
            common::sku(
                "Storage SKU",
                "https://learn.microsoft.com/en-us/rest/api/storagerp/srp_sku_types",
                sku_name,
            ),
            common::caf(
                "st",
                "Storage Name should comply with naming conventions",
                "https://learn.microsoft.com/en-us/azure/cloud-adoption-framework/ready/azure-best-practices/resource-abbreviations",
            ),
            common::enabled_flag(
                "st-007",
                Category::Security,
                "Storage Account should use HTTPS only",
                "https://learn.microsoft.com/en-us/azure/storage/common/storage-require-secure-transfer",
                |a: &StorageAccount| a.props().and_then(|p| p.supports_https_traffic_only),
            ),
            min_tls_rule(),
        ]
    }
}
