//! Cooperative cancellation shared by every blocking call in a scan.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{AzqrError, Result};

/// Cloneable cancellation signal. Cancelling any clone cancels all of them.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `fut` unless the token fires first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(AzqrError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(AzqrError::Cancelled),
            res = fut => res,
        }
    }

    /// Sleep for `delay`, returning early with `Cancelled` if the token fires.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        self.guard(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
