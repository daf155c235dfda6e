//! Deadline bookkeeping shared by every full-wait.
//!
//! A [`RetryGuard`] is built once per call. Each time the wrapped operation is
//! interrupted the guard counts the interrupt, checks the deadline, and hands
//! back the time still owed to the caller, so a wait of `D` never finishes
//! early just because it was woken spuriously.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::Interrupt;
use crate::error::WaitError;

/// Drive one guarded wait.
///
/// `$op` is re-evaluated on every attempt with `$remaining` bound to the time
/// left, so it may freely borrow `&mut` state between attempts. The operation
/// is polled before the interrupt so a ready primitive is never reported as
/// interrupted.
macro_rules! retry_loop {
    ($guard:ident, |$remaining:ident| $op:expr) => {{
        let intr = $guard.interrupt();
        loop {
            let $remaining = $guard.remaining();
            let done = tokio::select! {
                biased;
                value = $op => Some(value),
                _ = intr.interrupted() => None,
            };
            if let Some(value) = done {
                break Ok($guard.outcome(Some(value)));
            }
            match $guard.absorb() {
                Ok($crate::wait::guard::Retry::Again) => continue,
                Ok($crate::wait::guard::Retry::Expired) => break Ok($guard.outcome(None)),
                Err(e) => break Err(e),
            }
        }
    }};
}

pub(crate) use retry_loop;

/// How long a single wait may block.
///
/// Zero has a different meaning per primitive, so callers pick the meaning
/// explicitly with [`Timeout::zero_is_immediate`] or [`Timeout::zero_is_forever`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// One non-blocking attempt.
    TryOnce,
    /// Block for at most this long.
    Within(Duration),
    /// Block until satisfied; no deadline is tracked.
    Forever,
}

impl Timeout {
    pub const fn try_once() -> Self {
        Timeout::TryOnce
    }

    pub const fn wait_forever() -> Self {
        Timeout::Forever
    }

    /// A zero duration collapses to [`Timeout::TryOnce`].
    pub const fn within(duration: Duration) -> Self {
        if duration.is_zero() {
            Timeout::TryOnce
        } else {
            Timeout::Within(duration)
        }
    }

    /// Sleep, offer and poll: zero means "do not block".
    pub const fn zero_is_immediate(duration: Duration) -> Self {
        Self::within(duration)
    }

    /// Join and object wait: zero means "block until satisfied".
    pub const fn zero_is_forever(duration: Duration) -> Self {
        if duration.is_zero() {
            Timeout::Forever
        } else {
            Timeout::Within(duration)
        }
    }

    pub const fn is_forever(&self) -> bool {
        matches!(self, Timeout::Forever)
    }

    fn deadline(&self, start: Instant) -> Option<Instant> {
        match self {
            Timeout::TryOnce => Some(start),
            // An unrepresentable deadline is as good as none.
            Timeout::Within(d) => start.checked_add(*d),
            Timeout::Forever => None,
        }
    }
}

/// Result of a guarded wait: the operation's value, if it completed, and
/// whether any interrupt was absorbed on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: Option<T>,
    pub interrupted: bool,
}

/// What to do after an interrupt was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Time remains; run the operation again.
    Again,
    /// The deadline has passed; give up without the value.
    Expired,
}

/// Per-call interrupt accumulator and deadline.
#[derive(Debug)]
pub struct RetryGuard<'a> {
    intr: &'a Interrupt,
    what: &'static str,
    started: Instant,
    deadline: Option<Instant>,
    interrupts: u32,
}

impl<'a> RetryGuard<'a> {
    pub fn new(intr: &'a Interrupt, what: &'static str, timeout: Timeout) -> Self {
        let started = Instant::now();
        Self {
            intr,
            what,
            started,
            deadline: timeout.deadline(started),
            interrupts: 0,
        }
    }

    pub fn interrupt(&self) -> &'a Interrupt {
        self.intr
    }

    /// Time left before the deadline, `None` when waiting forever.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn interrupted(&self) -> bool {
        self.interrupts > 0
    }

    pub fn outcome<T>(&self, value: Option<T>) -> Outcome<T> {
        Outcome {
            value,
            interrupted: self.interrupted(),
        }
    }

    /// Record one interrupt.
    ///
    /// A passed deadline wins: the wait ends unsatisfied. Otherwise the
    /// interrupt that brings the count to the handle's budget fails with
    /// [`WaitError::ExcessiveInterrupt`], so `budget - 1` interrupts are
    /// absorbed.
    pub fn absorb(&mut self) -> Result<Retry, WaitError> {
        self.interrupts += 1;
        trace!(what = self.what, interrupts = self.interrupts, "wait interrupted");

        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(Retry::Expired);
        }

        if self.interrupts >= self.intr.budget() {
            return Err(WaitError::ExcessiveInterrupt {
                what: self.what,
                attempts: self.interrupts,
                elapsed: self.started.elapsed(),
            });
        }
        Ok(Retry::Again)
    }

    /// Run `op` with the remaining time until it completes, the deadline
    /// passes after an interrupt, or the interrupt budget is spent.
    ///
    /// The future returned by `op` must not borrow from `op` itself; the
    /// wrappers over `&mut` primitives drive the loop directly instead.
    pub async fn run<T, F, Fut>(self, mut op: F) -> Result<Outcome<T>, WaitError>
    where
        F: FnMut(Option<Duration>) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut guard = self;
        retry_loop!(guard, |remaining| op(remaining))
    }
}

/// Await `fut` for at most `remaining` (`None` = unbounded).
/// Returns `None` if the time ran out first.
pub async fn within<F: Future>(remaining: Option<Duration>, fut: F) -> Option<F::Output> {
    match remaining {
        None => Some(fut.await),
        Some(d) => tokio::time::timeout(d, fut).await.ok(),
    }
}
