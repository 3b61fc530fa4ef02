//! Paged listing capability and the loop that drains it.

use async_trait::async_trait;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::retry::RetryPolicy;

/// One paged enumeration of resources.
#[async_trait]
pub trait Pager<T>: Send {
    /// Whether another page is available.
    fn more(&self) -> bool;

    /// Fetch the next page. On error the pager must not advance, so the
    /// same page can be requested again.
    async fn next_page(&mut self) -> Result<Vec<T>>;
}

/// Lists resources of one kind in a resource group.
pub trait ResourceLister<T>: Send + Sync {
    fn pager(&self, resource_group: &str) -> Result<Box<dyn Pager<T>>>;
}

/// Drain `pager`, concatenating pages in the order received.
///
/// Transient page failures are retried per `retry`; anything else aborts
/// the listing and no partial list is returned.
pub async fn collect_pages<T: Send>(
    pager: &mut dyn Pager<T>,
    retry: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut pages = 0usize;

    while pager.more() {
        let mut backoff = retry.backoff();
        let page = loop {
            match cancel.guard(pager.next_page()).await {
                Ok(page) => break page,
                Err(e) => backoff.wait_or_fail(e, cancel).await?,
            }
        };
        pages += 1;
        debug!(page = pages, items = page.len(), "fetched page");
        items.extend(page);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AzqrError;
    use crate::testing::{PendingPager, StaticLister};
    use std::collections::HashSet;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[tokio::test]
    async fn drains_k_pages_of_n_items() {
        let (k, n) = (4, 5);
        let pages: Vec<Vec<u32>> = (0..k)
            .map(|p| (0..n).map(|i| p * n + i).collect())
            .collect();
        let lister = StaticLister::new(pages);

        let mut pager = lister.pager("rg").unwrap();
        let items = collect_pages(pager.as_mut(), &fast_retry(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(items.len(), (k * n) as usize);
        let unique: HashSet<_> = items.iter().collect();
        assert_eq!(unique.len(), items.len());
        assert_eq!(items, (0..k * n).collect::<Vec<_>>());
        // No request after the last page.
        assert_eq!(lister.page_requests(), k as usize);
    }

    #[tokio::test]
    async fn empty_listing_makes_no_requests() {
        let lister = StaticLister::<u32>::new(vec![]);
        let mut pager = lister.pager("rg").unwrap();
        let items = collect_pages(pager.as_mut(), &fast_retry(), &CancelToken::new())
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(lister.page_requests(), 0);
    }

    #[tokio::test]
    async fn transient_failure_retries_same_page() {
        let lister = StaticLister::new(vec![vec![1, 2], vec![3]])
            .fail_page(1, || AzqrError::Throttled { retry_after: None }, 2);
        let mut pager = lister.pager("rg").unwrap();
        let items = collect_pages(pager.as_mut(), &fast_retry(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(lister.page_requests(), 4);
    }

    #[tokio::test]
    async fn permanent_failure_aborts_listing() {
        let lister = StaticLister::new(vec![vec![1, 2], vec![3]])
            .fail_page(1, || AzqrError::NotFound("rg".into()), 1);
        let mut pager = lister.pager("rg").unwrap();
        let res = collect_pages(pager.as_mut(), &fast_retry(), &CancelToken::new()).await;
        assert!(matches!(res, Err(AzqrError::NotFound(_))));
        assert_eq!(lister.page_requests(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_return_error() {
        let lister = StaticLister::new(vec![vec![1]])
            .fail_page(0, || AzqrError::Network("reset".into()), 10);
        let mut pager = lister.pager("rg").unwrap();
        let res = collect_pages(pager.as_mut(), &fast_retry(), &CancelToken::new()).await;
        assert!(matches!(res, Err(AzqrError::Network(_))));
        assert_eq!(lister.page_requests(), 4);
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_fetch() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let mut pager = PendingPager;
        let res: Result<Vec<u32>> = collect_pages(&mut pager, &fast_retry(), &cancel).await;
        assert!(matches!(res, Err(AzqrError::Cancelled)));
    }
}
