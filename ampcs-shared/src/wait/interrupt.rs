//! Spurious-interrupt source for the full-wait family.
//!
//! An [`Interrupt`] plays the part of a thread's interrupt status: delivering
//! an interrupt wakes whichever wait is currently racing against it, and an
//! interrupt delivered while nobody waits stays latched until the next wait
//! observes it. Repeated deliveries while latched coalesce into one.
//!
//! This is not a cancellation mechanism. Cancellation is
//! requested with a `CancellationToken`; an interrupt only asks the current
//! wait to re-evaluate its remaining time.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use super::MAX_INTERRUPT;

/// Cloneable interrupt handle. All clones share the same latch.
#[derive(Clone)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

struct Inner {
    pending: AtomicBool,
    notify: Notify,
    budget: u32,
}

impl Interrupt {
    /// Handle with the default per-wait budget of [`MAX_INTERRUPT`].
    pub fn new() -> Self {
        Self::with_budget(MAX_INTERRUPT)
    }

    /// Handle whose waits fail on the `budget`-th interrupt (at least one).
    pub fn with_budget(budget: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: AtomicBool::new(false),
                notify: Notify::new(),
                budget: budget.max(1),
            }),
        }
    }

    /// Interrupts absorbed by a single full-wait before it fails.
    pub fn budget(&self) -> u32 {
        self.inner.budget
    }

    /// Deliver an interrupt.
    pub fn interrupt(&self) {
        self.inner.pending.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
    }

    /// Whether an interrupt is latched and not yet observed.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Discard a latched interrupt. Returns whether one was pending.
    pub fn clear(&self) -> bool {
        self.inner.pending.swap(false, Ordering::SeqCst)
    }

    /// Resolves once an interrupt is delivered, consuming it.
    ///
    /// Cancel safe: dropping the future before it resolves consumes nothing.
    pub async fn interrupted(&self) {
        loop {
            if self.clear() {
                return;
            }
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            // Re-check after registering so a delivery in between is not missed.
            if self.clear() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("pending", &self.is_pending())
            .field("budget", &self.inner.budget)
            .finish()
    }
}
