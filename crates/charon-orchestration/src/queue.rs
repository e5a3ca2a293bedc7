//! Single-slot FIFO queue for routines
//!
//! Routines touch shared state (the installed tool, generated sources, the
//! game data file) and must not interleave. [`RoutineQueue::schedule`] runs
//! submitted work one at a time. The slot is a one-permit semaphore; waiters
//! are woken in the order they started waiting.

use crate::error::{Error, Result};
use command_executor::CancelSignal;
use smol::lock::{Semaphore, SemaphoreGuard};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Runs scheduled work one at a time, first come first served
pub struct RoutineQueue {
    slot: Semaphore,
    queue_size: AtomicUsize,
}

impl Default for RoutineQueue {
    fn default() -> Self {
        Self {
            slot: Semaphore::new(1),
            queue_size: AtomicUsize::new(0),
        }
    }
}

impl RoutineQueue {
    /// Create an idle queue
    pub fn new() -> Self {
        Self::default()
    }

    /// True while some scheduled work holds the slot
    pub fn is_running(&self) -> bool {
        self.slot.try_acquire().is_none()
    }

    /// Number of callers still waiting for the slot
    pub fn queue_size(&self) -> usize {
        self.queue_size.load(Ordering::Acquire)
    }

    /// Wait for the slot, then run `work`
    ///
    /// The slot is released when `work` finishes, panics, or its future is
    /// dropped.
    pub async fn schedule<F>(&self, work: F) -> Result<F::Output>
    where
        F: Future,
    {
        let _slot = self.acquire(None).await?;
        Ok(work.await)
    }

    /// Like [`schedule`](Self::schedule), but gives up waiting when `cancel` fires
    ///
    /// Work that has not started when cancellation is observed never runs.
    /// Once started, `work` is responsible for observing `cancel` itself.
    pub async fn schedule_with_cancel<F>(&self, work: F, cancel: &CancelSignal) -> Result<F::Output>
    where
        F: Future,
    {
        let _slot = self.acquire(Some(cancel)).await?;
        Ok(work.await)
    }

    async fn acquire(&self, cancel: Option<&CancelSignal>) -> Result<SemaphoreGuard<'_>> {
        if cancel.is_some_and(CancelSignal::is_cancelled) {
            return Err(Error::Cancelled);
        }

        self.queue_size.fetch_add(1, Ordering::AcqRel);
        let _queued = Queued(&self.queue_size);

        if let Some(slot) = self.slot.try_acquire() {
            return Ok(slot);
        }
        trace!("Routine queued behind running work");

        let slot = match cancel {
            None => self.slot.acquire().await,
            Some(cancel) => {
                let acquired = async { Some(self.slot.acquire().await) };
                let cancelled = async {
                    cancel.cancelled().await;
                    None
                };
                futures_lite::future::or(acquired, cancelled)
                    .await
                    .ok_or(Error::Cancelled)?
            }
        };

        if cancel.is_some_and(CancelSignal::is_cancelled) {
            return Err(Error::Cancelled);
        }
        Ok(slot)
    }
}

impl std::fmt::Debug for RoutineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutineQueue")
            .field("running", &self.is_running())
            .field("queue_size", &self.queue_size())
            .finish()
    }
}

/// Keeps `queue_size` symmetric however acquisition ends
struct Queued<'a>(&'a AtomicUsize);

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
