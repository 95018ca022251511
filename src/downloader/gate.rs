//! Concurrency gate bounding in-flight fetches
//!
//! A [`GatePermit`] is an RAII guard: it returns its slot when dropped,
//! whether the fetch succeeded, failed, was cancelled, or panicked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Burst ceiling shared by every worker
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    burst: usize,
}

/// Held slot in a [`ConcurrencyGate`]
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The gate's semaphore was closed
#[derive(Debug, thiserror::Error)]
#[error("concurrency gate closed")]
pub struct GateClosed;

impl ConcurrencyGate {
    /// Create a gate admitting at most `burst` holders (at least 1)
    pub fn new(burst: usize) -> Self {
        let burst = burst.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(burst)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            burst,
        }
    }

    /// Configured ceiling
    pub fn burst(&self) -> usize {
        self.burst
    }

    /// Slots free right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots held right now
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait for a slot
    ///
    /// # Errors
    /// Returns [`GateClosed`] only after [`ConcurrencyGate::close`].
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(GatePermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Refuse all future acquisitions and wake pending ones with [`GateClosed`]
    pub fn close(&self) {
        self.semaphore.close();
    }
}
