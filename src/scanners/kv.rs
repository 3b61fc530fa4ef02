//! Key Vault.

use serde::{Deserialize, Serialize};

use super::{ResourceKind, ScannerKind, ServiceScanner};
use crate::resource::{has_private_endpoint, PrivateEndpointConnection, Resource};
use crate::rules::{common, Category, Rule};

pub type Vault = Resource<VaultProperties>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultProperties {
    pub tenant_id: Option<String>,
    pub sku: Option<VaultSku>,
    pub enable_soft_delete: Option<bool>,
    pub enable_purge_protection: Option<bool>,
    pub private_endpoint_connections: Option<Vec<PrivateEndpointConnection>>,
}

/// Key Vault keeps its SKU under `properties`, not at the top level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSku {
    pub family: Option<String>,
    pub name: Option<String>,
}

pub struct KeyVault;

pub type KeyVaultScanner = ServiceScanner<KeyVault>;

fn sku_name(v: &Vault) -> Option<&str> {
    v.props()
        .and_then(|p| p.sku.as_ref())
        .and_then(|s| s.name.as_deref())
}

impl ResourceKind for KeyVault {
    type Resource = Vault;

    const KIND: ScannerKind = ScannerKind::KeyVault;
    const PROVIDER: &'static str = "Microsoft.KeyVault/vaults";
    const API_VERSION: &'static str = "2022-07-01";

    fn rules() -> Vec<Rule<Vault>> {
        vec![
            common::diagnostic_settings(
                "Key Vault should have diagnostic settings enabled",
                "https://learn.microsoft.com/en-us/azure/key-vault/general/monitor-key-vault",
            ),
            common::sla(
                "Key Vault should have a SLA",
                "https://www.azure.cn/en-us/support/sla/key-vault/",
                |_: &Vault| "99.99%",
            ),
            common::private_endpoint(
                "Key Vault should have private endpoints enabled",
                "https://learn.microsoft.com/en-us/azure/key-vault/general/private-link-service",
                |v: &Vault| {
                    has_private_endpoint(
                        v.props()
                            .and_then(|p| p.private_endpoint_connections.as_ref()),
                    )
                },
            ),
            common::sku(
                "Key Vault SKU",
                "https://azure.microsoft.com/en-us/pricing/details/key-vault/",
                sku_name,
            ),
            common::caf(
                "kv",
                "Key Vault Name should comply with naming conventions",
                "https://learn.microsoft.com/en-us/azure/cloud-adoption-framework/ready/azure-best-practices/resource-abbreviations",
            ),
            common::enabled_flag(
                "kv-008",
                Category::DisasterRecovery,
                "Key Vault should have soft delete enabled",
                "https://learn.microsoft.com/en-us/azure/key-vault/general/soft-delete-overview",
                |v: &Vault| v.props().and_then(|p| p.enable_soft_delete),
            ),
            common::enabled_flag(
                "kv-009",
                Category::DisasterRecovery,
                "Key Vault should have purge protection enabled",
                "https://learn.microsoft.com/en-us/azure/key-vault/general/soft-delete-overview#purge-protection",
                |v: &Vault| v.props().and_then(|p| p.enable_purge_protection),
            ),
        ]
    }
}
