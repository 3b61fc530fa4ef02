//! Container Instances (container groups).

use serde::{Deserialize, Serialize};

use super::{ResourceKind, ScannerKind, ServiceScanner};
use crate::resource::Resource;
use crate::rules::{common, Rule};

pub type ContainerGroup = Resource<ContainerGroupProperties>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerGroupProperties {
    /// `Standard` or `Dedicated`.
    pub sku: Option<String>,
    pub os_type: Option<String>,
    pub ip_address: Option<IpAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    #[serde(rename = "type")]
    pub address_type: Option<String>,
    pub ip: Option<String>,
}

pub struct ContainerInstance;

pub type ContainerInstanceScanner = ServiceScanner<ContainerInstance>;

fn sku(g: &ContainerGroup) -> Option<&str> {
    g.props().and_then(|p| p.sku.as_deref())
}

fn is_private(g: &ContainerGroup) -> bool {
    g.props()
        .and_then(|p| p.ip_address.as_ref())
        .and_then(|ip| ip.address_type.as_deref())
        .is_some_and(|t| t.eq_ignore_ascii_case("Private"))
}

impl ResourceKind for ContainerInstance {
    type Resource = ContainerGroup;

    const KIND: ScannerKind = ScannerKind::ContainerInstance;
    const PROVIDER: &'static str = "Microsoft.ContainerInstance/containerGroups";
    const API_VERSION: &'static str = "2023-05-01";

    fn rules() -> Vec<Rule<ContainerGroup>> {
        vec![
            common::diagnostic_settings(
                "Container Instances should have diagnostic settings enabled",
                "https://learn.microsoft.com/en-us/azure/container-instances/container-instances-log-analytics",
            ),
            // A group with no zones pinned is not zone redundant.
            common::availability_zones(
                "Container Instances should use availability zones",
                "https://learn.microsoft.com/en-us/azure/container-instances/availability-zones",
                |g: &ContainerGroup| Some(g.zones.as_ref().is_some_and(|z| !z.is_empty())),
            ),
            common::sla(
                "Container Instances should have a SLA",
                "https://www.azure.cn/en-us/support/sla/container-instances/",
                |_: &ContainerGroup| "99.9%",
            ),
            common::private_endpoint(
                "Container Instances should use private IP addresses",
                "https://learn.microsoft.com/en-us/azure/container-instances/container-instances-vnet",
                is_private,
            ),
            common::sku(
                "Container Instances SKU",
                "https://azure.microsoft.com/en-us/pricing/details/container-instances/",
                sku,
            ),
            common::caf(
                "ci",
                "Container Instances Name should comply with naming conventions",
                "https://learn.microsoft.com/en-us/azure/cloud-adoption-framework/ready/azure-best-practices/resource-abbreviations",
            ),
        ]
    }
}
