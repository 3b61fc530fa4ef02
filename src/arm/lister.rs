use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use super::ArmClient;
use crate::error::Result;
use crate::paging::{Pager, ResourceLister};

/// ARM list response: one page of values plus an optional continuation link.
#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

/// Follows `nextLink` until ARM stops returning one, or returns a link
/// already fetched.
pub struct ArmPager<T> {
    client: Arc<ArmClient>,
    next: Option<String>,
    fetched: HashSet<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArmPager<T> {
    pub fn new(client: Arc<ArmClient>, first_url: String) -> Self {
        Self {
            client,
            next: Some(first_url),
            fetched: HashSet::new(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Pager<T> for ArmPager<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn more(&self) -> bool {
        self.next.is_some()
    }

    async fn next_page(&mut self) -> Result<Vec<T>> {
        let Some(url) = self.next.clone() else {
            return Ok(Vec::new());
        };
        let page: Page<T> = self.client.get_json(&url).await?;
        self.fetched.insert(url);
        self.next = match page.next_link.filter(|link| !link.is_empty()) {
            Some(link) if self.fetched.contains(&link) => {
                warn!(next_link = %link, "nextLink points at a page already fetched, stopping");
                None
            }
            link => link,
        };
        Ok(page.value)
    }
}

/// Production listing capability for one resource provider type.
pub struct ArmLister<T> {
    client: Arc<ArmClient>,
    provider: &'static str,
    api_version: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArmLister<T> {
    pub fn new(client: Arc<ArmClient>, provider: &'static str, api_version: &'static str) -> Self {
        Self {
            client,
            provider,
            api_version,
            _marker: PhantomData,
        }
    }
}

impl<T> ResourceLister<T> for ArmLister<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn pager(&self, resource_group: &str) -> Result<Box<dyn Pager<T>>> {
        let url = self
            .client
            .resource_group_url(resource_group, self.provider, self.api_version)?;
        Ok(Box::new(ArmPager::new(
            Arc::clone(&self.client),
            url.to_string(),
        )))
    }
}
