//! Counting slot limiter shared by all dispatch tasks.
//!
//! Each in-flight job holds one slot. Slots are returned by dropping the
//! `SlotGuard`, so release happens on every exit path of the holder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Upper bound applied to caller-supplied concurrency.
pub const MAX_CONCURRENCY: usize = 10;

#[derive(Debug, Default)]
struct Usage {
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

/// Limits how many jobs are in flight. Waiters are served in FIFO order
/// (tokio's semaphore is fair), so every `acquire` eventually succeeds.
#[derive(Debug, Clone)]
pub struct SlotLimiter {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    usage: Arc<Usage>,
}

impl SlotLimiter {
    /// Create a limiter with `requested` slots, clamped to [1, MAX_CONCURRENCY].
    pub fn new(requested: usize) -> Self {
        let capacity = requested.clamp(1, MAX_CONCURRENCY);
        if capacity != requested {
            tracing::debug!(requested, capacity, "clamped concurrency");
        }
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            usage: Arc::new(Usage::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.usage.in_use.load(Ordering::Acquire)
    }

    /// Highest number of slots held at the same time since creation.
    pub fn peak(&self) -> usize {
        self.usage.peak.load(Ordering::Acquire)
    }

    /// Waits for a free slot. Errors only if the semaphore was closed.
    pub async fn acquire(&self) -> Result<SlotGuard, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        let now = self.usage.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.usage.peak.fetch_max(now, Ordering::AcqRel);
        Ok(SlotGuard {
            _permit: permit,
            usage: Arc::clone(&self.usage),
        })
    }
}

/// Holds one slot; dropping it returns the slot.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    usage: Arc<Usage>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        // Counter first: the permit (released after this body) may wake a waiter
        // that increments immediately.
        self.usage.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}
