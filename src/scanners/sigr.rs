//! SignalR Service.

use serde::{Deserialize, Serialize};

use super::{ResourceKind, ScannerKind, ServiceScanner};
use crate::resource::{has_private_endpoint, PrivateEndpointConnection, Resource};
use crate::rules::{common, Rule};

pub type SignalRResource = Resource<SignalRProperties>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRProperties {
    pub host_name: Option<String>,
    pub public_network_access: Option<String>,
    pub private_endpoint_connections: Option<Vec<PrivateEndpointConnection>>,
}

pub struct SignalR;

pub type SignalRScanner = ServiceScanner<SignalR>;

fn sku_name(r: &SignalRResource) -> Option<&str> {
    r.sku_name()
}

impl ResourceKind for SignalR {
    type Resource = SignalRResource;

    const KIND: ScannerKind = ScannerKind::SignalR;
    const PROVIDER: &'static str = "Microsoft.SignalRService/signalR";
    const API_VERSION: &'static str = "2023-02-01";

    fn rules() -> Vec<Rule<SignalRResource>> {
        vec![
            common::diagnostic_settings(
                "SignalR should have diagnostic settings enabled",
                "https://learn.microsoft.com/en-us/azure/azure-signalr/signalr-howto-diagnostic-logs",
            ),
            // Only the Premium tier is zone redundant.
            common::availability_zones(
                "SignalR should have availability zones enabled",
                "https://learn.microsoft.com/en-us/azure/azure-signalr/availability-zones",
                |r: &SignalRResource| r.sku_name().map(|name| name.contains("Premium")),
            ),
            common::sla(
                "SignalR should have a SLA",
                "https://www.azure.cn/en-us/support/sla/signalr-service/",
                |_: &SignalRResource| "99.9%",
            ),
            common::private_endpoint(
                "SignalR should have private endpoints enabled",
                "https://learn.microsoft.com/en-us/azure/azure-signalr/howto-private-endpoints",
                |r: &SignalRResource| {
                    has_private_endpoint(
                        r.props()
                            .and_then(|p| p.private_endpoint_connections.as_ref()),
                    )
                },
            ),
            common::sku(
                "SignalR SKU",
                "https://azure.microsoft.com/en-us/pricing/details/signalr-service/",
                sku_name,
            ),
            common::caf(
                "sigr",
                "SignalR Name should comply with naming conventions",
                "https://learn.microsoft.com/en-us/azure/cloud-adoption-framework/ready/azure-best-practices/resource-abbreviations",
            ),
        ]
    }
}
