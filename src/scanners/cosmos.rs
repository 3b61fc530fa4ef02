//! Cosmos DB accounts.

use serde::{Deserialize, Serialize};

use super::{ResourceKind, ScannerKind, ServiceScanner};
use crate::resource::{has_private_endpoint, PrivateEndpointConnection, Resource};
use crate::rules::{common, Rule};

pub type DatabaseAccount = Resource<DatabaseAccountProperties>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccountProperties {
    pub database_account_offer_type: Option<String>,
    pub enable_multiple_write_locations: Option<bool>,
    pub locations: Option<Vec<Location>>,
    pub private_endpoint_connections: Option<Vec<PrivateEndpointConnection>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_name: Option<String>,
    pub failover_priority: Option<i32>,
    pub is_zone_redundant: Option<bool>,
}

pub struct CosmosDb;

pub type CosmosDbScanner = ServiceScanner<CosmosDb>;

fn locations(a: &DatabaseAccount) -> &[Location] {
    a.props()
        .and_then(|p| p.locations.as_deref())
        .unwrap_or_default()
}

fn zone_redundant(a: &DatabaseAccount) -> Option<bool> {
    let locations = locations(a);
    if locations.is_empty() {
        return None;
    }
    Some(locations.iter().any(|l| l.is_zone_redundant == Some(true)))
}

fn sla(a: &DatabaseAccount) -> &'static str {
    let multi_write = a
        .props()
        .and_then(|p| p.enable_multiple_write_locations)
        .unwrap_or(false);
    if multi_write && locations(a).len() > 1 {
        "99.999%"
    } else if zone_redundant(a) == Some(true) {
        "99.995%"
    } else {
        "99.99%"
    }
}

fn offer_type(a: &DatabaseAccount) -> Option<&str> {
    a.props()
        .and_then(|p| p.database_account_offer_type.as_deref())
}

impl ResourceKind for CosmosDb {
    type Resource = DatabaseAccount;

    const KIND: ScannerKind = ScannerKind::CosmosDb;
    const PROVIDER: &'static str = "Microsoft.DocumentDB/databaseAccounts";
    const API_VERSION: &'static str = "2023-04-15";

    fn rules() -> Vec<Rule<DatabaseAccount>> {
        vec![
            common::diagnostic_settings(
                "CosmosDB should have diagnostic settings enabled",
                "https://learn.microsoft.com/en-us/azure/cosmos-db/monitor-resource-logs",
            ),
            common::availability_zones(
                "CosmosDB should have availability zones enabled",
                "https://learn.microsoft.com/en-us/azure/cosmos-db/high-availability",
                zone_redundant,
            ),
            common::sla(
                "CosmosDB should have a SLA",
                "https://www.azure.cn/en-us/support/sla/cosmos-db/",
                sla,
            ),
            common::private_endpoint(
                "CosmosDB should have private endpoints enabled",
                "https://learn.microsoft.com/en-us/azure/cosmos-db/how-to-configure-private-endpoints",
                |a: &DatabaseAccount| {
                    has_private_endpoint(
                        a.props()
                            .and_then(|p| p.private_endpoint_connections.as_ref()),
                    )
                },
            ),
            common::sku(
                "CosmosDB SKU",
                "https://azure.microsoft.com/en-us/pricing/details/cosmos-db/",
                offer_type,
            ),
            common::caf(
                "cosmos",
                "CosmosDB Name should comply with naming conventions",
                "https://learn.microsoft.com/en-us/azure/cloud-adoption-framework/ready/azure-best-practices/resource-abbreviations",
            ),
        ]
    }
}
