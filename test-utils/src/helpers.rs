//! Test helper functions and utilities

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use light_wallet::Wallet;
use light_wallet::types::Height;

/// Default time a polling helper waits before giving up
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Test error injection helper
///
/// Once enabled, [`ErrorInjector::should_fail`] lets the configured number of
/// calls through and fails every call after that.
#[derive(Debug, Default)]
pub struct ErrorInjector {
    enabled: AtomicBool,
    passes_left: AtomicUsize,
}

impl ErrorInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call from now on
    pub fn enable(&self) {
        self.passes_left.store(0, Ordering::SeqCst);
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Let `n` calls succeed, then fail every call
    pub fn fail_after(&self, n: usize) {
        self.passes_left.store(n, Ordering::SeqCst);
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn should_fail(&self) -> bool {
        if !self.enabled.load(Ordering::SeqCst) {
            return false;
        }
        self.passes_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_err()
    }
}

/// Poll `check` until it returns true or `timeout` elapses. Returns the last result.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until the wallet's ledger tip reaches `height`.
pub async fn wait_for_height(wallet: &Wallet, height: Height) -> bool {
    wait_for(DEFAULT_WAIT, || async { wallet.synced_height().await >= height }).await
}

/// Run `future` with a timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, &'static str>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future).await.map_err(|_| "Test timed out")
}
