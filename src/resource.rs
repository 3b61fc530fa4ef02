//! Resource descriptors as returned by Azure Resource Manager.
//!
//! Every field is optional: ARM omits anything unset, and rules must
//! treat a missing field as "not applicable" rather than fail.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identity fields every scanned resource exposes.
pub trait AzureResource: DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> Option<&str>;
    fn name(&self) -> Option<&str>;
    fn resource_type(&self) -> Option<&str>;
    fn location(&self) -> Option<&str>;
}

/// The common ARM envelope, parameterised by the kind-specific `properties` bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<P> {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub location: Option<String>,
    pub sku: Option<Sku>,
    pub zones: Option<Vec<String>>,
    pub properties: Option<P>,
}

impl<P> Resource<P> {
    pub fn props(&self) -> Option<&P> {
        self.properties.as_ref()
    }

    pub fn sku_name(&self) -> Option<&str> {
        self.sku.as_ref().and_then(|s| s.name.as_deref())
    }
}

impl<P> AzureResource for Resource<P>
where
    P: DeserializeOwned + Send + Sync + 'static,
{
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

/// Top-level `sku` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub name: Option<String>,
    pub tier: Option<String>,
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateEndpointConnection {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// True when at least one private endpoint connection is listed.
pub fn has_private_endpoint(connections: Option<&Vec<PrivateEndpointConnection>>) -> bool {
    connections.is_some_and(|c| !c.is_empty())
}
