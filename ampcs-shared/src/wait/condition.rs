//! Condition waits over a `Notify`.
//!
//! [`FullWait`] supports the usual "check predicate, wait, check again" loop:
//!
//! ```no_run
//! # use std::time::Duration;
//! # use ampcs_shared::wait::{FullWait, Interrupt};
//! # async fn example(
//! #     ready: impl Fn() -> bool,
//! #     notify: &tokio::sync::Notify,
//! # ) -> Result<(), ampcs_shared::WaitError> {
//! let intr = Interrupt::new();
//! let mut waiter = FullWait::new(&intr, notify, Duration::from_secs(2));
//! while !ready() {
//!     if waiter.wait().await?.timed_out() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A wake-up may be spurious, so a single `wait()` never reports a timeout
//! on its own account; the next call does, once the deadline has passed.

use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::guard::within;
use super::status::WaitStatus;
use super::{Interrupt, MAX_TIMEDOUT};
use crate::error::WaitError;

/// Deadline-preserving condition waiter. Interrupts across all calls share
/// one budget.
#[derive(Debug)]
pub struct FullWait<'a> {
    intr: &'a Interrupt,
    notify: &'a Notify,
    started: Instant,
    deadline: Option<Instant>,
    interrupts: u32,
    timed_out: u32,
}

impl<'a> FullWait<'a> {
    /// `duration` of zero waits without a deadline.
    pub fn new(intr: &'a Interrupt, notify: &'a Notify, duration: Duration) -> Self {
        let started = Instant::now();
        let deadline = if duration.is_zero() {
            None
        } else {
            started.checked_add(duration)
        };
        Self {
            intr,
            notify,
            started,
            deadline,
            interrupts: 0,
            timed_out: 0,
        }
    }

    /// Wait once for a notification within the time remaining.
    ///
    /// Reports `timed_out` only when called after the deadline. A caller that
    /// keeps waiting past more than [`MAX_TIMEDOUT`] such reports gets
    /// [`WaitError::TimeoutIgnored`].
    pub async fn wait(&mut self) -> Result<WaitStatus, WaitError> {
        let mut remaining = None;

        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now >= deadline {
                self.timed_out += 1;
                if self.timed_out > MAX_TIMEDOUT {
                    return Err(WaitError::TimeoutIgnored {
                        what: "FullWait::wait",
                        count: self.timed_out,
                    });
                }
                return Ok(self.status(true));
            }
            remaining = Some(deadline - now);
        }

        let interrupted = tokio::select! {
            biased;
            _ = within(remaining, self.notify.notified()) => false,
            _ = self.intr.interrupted() => true,
        };

        if interrupted {
            self.interrupts += 1;
            let expired = self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
            // Same convention as `RetryGuard::absorb`: a passed deadline wins,
            // otherwise the interrupt that reaches the budget is fatal.
            if !expired && self.interrupts >= self.intr.budget() {
                return Err(WaitError::ExcessiveInterrupt {
                    what: "FullWait::wait",
                    attempts: self.interrupts,
                    elapsed: self.started.elapsed(),
                });
            }
        }

        Ok(self.status(false))
    }

    fn status(&self, timed_out: bool) -> WaitStatus {
        WaitStatus {
            timed_out,
            interrupted: self.interrupts > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_condition_loop_sees_notification() {
        let intr = Interrupt::new();
        let notify = Arc::new(Notify::new());
        let ready = Arc::new(AtomicBool::new(false));

        let (n, r) = (notify.clone(), ready.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            r.store(true, Ordering::SeqCst);
            n.notify_one();
        });

        let mut waiter = FullWait::new(&intr, &notify, Duration::from_secs(1));
        while !ready.load(Ordering::SeqCst) {
            let status = waiter.wait().await.unwrap();
            assert!(!status.timed_out());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported_on_next_call() {
        let intr = Interrupt::new();
        let notify = Notify::new();
        let start = Instant::now();
        let mut waiter = FullWait::new(&intr, &notify, Duration::from_millis(50));

        assert!(!waiter.wait().await.unwrap().timed_out());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(waiter.wait().await.unwrap().timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignoring_timeout_fails_fast() {
        let intr = Interrupt::new();
        let notify = Notify::new();
        let mut waiter = FullWait::new(&intr, &notify, Duration::from_millis(1));
        tokio::time::advance(Duration::from_millis(2)).await;

        for _ in 0..MAX_TIMEDOUT {
            assert!(waiter.wait().await.unwrap().timed_out());
        }
        let err = waiter.wait().await.unwrap_err();
        assert!(matches!(err, WaitError::TimeoutIgnored { .. }));
    }

    #[tokio::test]
    async fn test_interrupts_share_one_budget() {
        let intr = Interrupt::with_budget(2);
        let notify = Notify::new();
        let mut waiter = FullWait::new(&intr, &notify, Duration::ZERO);

        intr.interrupt();
        assert!(waiter.wait().await.unwrap().interrupted());
        intr.interrupt();
        assert!(waiter.wait().await.unwrap_err().is_excessive_interrupt());
    }
}
