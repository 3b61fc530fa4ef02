//! Deterministic stand-ins for the listing and diagnostics capabilities.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::diagnostics::DiagnosticsProvider;
use crate::error::{AzqrError, Result};
use crate::paging::{Pager, ResourceLister};

/// Scripted failure: page `index` fails `times` times before it succeeds.
#[derive(Clone, Copy)]
struct PageFailure {
    index: usize,
    make: fn() -> AzqrError,
    times: usize,
}

/// Serves fixed pages and counts page requests across all its pagers.
pub struct StaticLister<T> {
    pages: Vec<Vec<T>>,
    failure: Option<PageFailure>,
    requests: Arc<AtomicUsize>,
}

impl<T: Clone + Send + Sync + 'static> StaticLister<T> {
    pub fn new(pages: Vec<Vec<T>>) -> Self {
        Self {
            pages,
            failure: None,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail_page(mut self, index: usize, make: fn() -> AzqrError, times: usize) -> Self {
        self.failure = Some(PageFailure { index, make, times });
        self
    }

    pub fn page_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + Sync + 'static> ResourceLister<T> for StaticLister<T> {
    fn pager(&self, _resource_group: &str) -> Result<Box<dyn Pager<T>>> {
        Ok(Box::new(StaticPager {
            pages: self.pages.iter().cloned().collect(),
            index: 0,
            failure: self.failure,
            requests: Arc::clone(&self.requests),
        }))
    }
}

struct StaticPager<T> {
    pages: VecDeque<Vec<T>>,
    index: usize,
    failure: Option<PageFailure>,
    requests: Arc<AtomicUsize>,
}

#[async_trait]
impl<T: Send + 'static> Pager<T> for StaticPager<T> {
    fn more(&self) -> bool {
        !self.pages.is_empty()
    }

    async fn next_page(&mut self) -> Result<Vec<T>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure.as_mut() {
            if failure.index == self.index && failure.times > 0 {
                failure.times -= 1;
                return Err((failure.make)());
            }
        }
        let page = self.pages.pop_front().ok_or_else(|| {
            AzqrError::InvalidResponse("page requested after the last one".into())
        })?;
        self.index += 1;
        Ok(page)
    }
}

/// A pager whose fetch never completes; used to exercise cancellation.
pub struct PendingPager;

#[async_trait]
impl<T: Send + 'static> Pager<T> for PendingPager {
    fn more(&self) -> bool {
        true
    }

    async fn next_page(&mut self) -> Result<Vec<T>> {
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }
}

pub struct PendingLister;

impl<T: Send + 'static> ResourceLister<T> for PendingLister {
    fn pager(&self, _resource_group: &str) -> Result<Box<dyn Pager<T>>> {
        Ok(Box::new(PendingPager))
    }
}

/// Diagnostics stub with a fixed answer, optional leading failures, and a call counter.
pub struct StubDiagnostics {
    answer: bool,
    failures_left: AtomicUsize,
    make_err: fn() -> AzqrError,
    calls: AtomicUsize,
}

impl StubDiagnostics {
    pub fn always(answer: bool) -> Self {
        Self {
            answer,
            failures_left: AtomicUsize::new(0),
            make_err: || AzqrError::Network("unused".into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails with a transient error `failures` times, then answers.
    pub fn flaky(failures: usize, answer: bool) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            make_err: || AzqrError::Service {
                status: 503,
                message: "unavailable".into(),
            },
            ..Self::always(answer)
        }
    }

    /// Always fails with a permanent authorization error.
    pub fn unauthorized() -> Self {
        Self {
            failures_left: AtomicUsize::new(usize::MAX),
            make_err: || AzqrError::Unauthorized {
                status: 403,
                message: "forbidden".into(),
            },
            ..Self::always(false)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagnosticsProvider for StubDiagnostics {
    async fn has_diagnostics(&self, _resource_id: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err((self.make_err)());
        }
        Ok(self.answer)
    }
}
