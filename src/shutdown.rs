//! Graceful shutdown coordination utilities.
//!
//! A [`ShutdownCoordinator`] is created once by the caller and handed to every
//! worker. Workers race each suspension point against
//! [`ShutdownCoordinator::wait_for_shutdown`] so a Ctrl+C resolves all pending
//! identifiers as cancelled instead of leaving them unresolved.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Coordinates graceful shutdown across async tasks.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            is_shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Notifies all registered waiters exactly once.
    pub fn request_shutdown(&self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait_for_shutdown(&self) {
        // Register interest before checking the flag so a request landing in
        // between is not missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Run `fut` unless shutdown is requested first.
    ///
    /// Returns `None` when shutdown won the race; the future is dropped.
    pub async fn run_until_shutdown<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_shutdown_requested() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.wait_for_shutdown() => None,
            output = fut => Some(output),
        }
    }
}
