//! Full-wait wrappers.
//!
//! Every wrapper here absorbs spurious interrupts and keeps waiting for the
//! rest of the caller's requested duration. The only errors are the fatal
//! ones: an exhausted interrupt budget, or a primitive that was closed.
//!
//! | primitive | zero duration |
//! |---|---|
//! | [`full_sleep`] | returns immediately |
//! | [`full_join`] | waits forever |
//! | [`full_offer`], [`full_poll`] | one non-blocking attempt |
//! | [`full_put`], [`full_take`] | always wait forever |
//! | [`full_wait`] | waits forever |
//! | [`full_acquire`], [`full_wait_for`] | always wait forever |

use std::time::Duration;

use tokio::process::Child;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::{Notify, Semaphore};
use tracing::{error, warn};

use super::guard::{RetryGuard, Timeout, retry_loop, within};
use super::latch::Joinable;
use super::status::{
    AcquireStatus, JoinStatus, OfferStatus, PollStatus, WaitForStatus, WaitStatus, exit_code,
};
use super::Interrupt;
use crate::error::WaitError;

/// Sleep for the whole of `duration`, however often interrupted.
///
/// Returns whether any interrupt arrived.
pub async fn full_sleep(intr: &Interrupt, duration: Duration) -> Result<bool, WaitError> {
    if duration.is_zero() {
        return Ok(false);
    }

    let out = RetryGuard::new(intr, "full_sleep", Timeout::zero_is_immediate(duration))
        .run(|remaining| tokio::time::sleep(remaining.unwrap_or(Duration::MAX)))
        .await?;
    Ok(out.interrupted)
}

/// [`full_sleep`] for callers that cannot act on the fatal case: an
/// excessive interruption is logged with `message` and reported as an
/// interrupted sleep.
pub async fn full_sleep_logged(intr: &Interrupt, duration: Duration, message: &str) -> bool {
    match full_sleep(intr, duration).await {
        Ok(interrupted) => interrupted,
        Err(e) => {
            error!(sleep = ?duration, "{message}: {e}");
            true
        }
    }
}

/// Join `target` for at most `duration`; zero waits until it finishes.
pub async fn full_join<J: Joinable>(
    intr: &Interrupt,
    target: &mut J,
    duration: Duration,
) -> Result<JoinStatus, WaitError> {
    let mut guard = RetryGuard::new(intr, "full_join", Timeout::zero_is_forever(duration));
    let out = retry_loop!(guard, |remaining| within(remaining, target.finished()))?;
    Ok(JoinStatus {
        joined: target.is_finished(),
        interrupted: out.interrupted,
    })
}

/// Offer `value` to a bounded queue, waiting up to `duration` for room.
///
/// Zero makes one non-blocking attempt. A value that was not enqueued, for
/// lack of room or because the queue closed, is handed back in the status.
pub async fn full_offer<T>(
    intr: &Interrupt,
    queue: &mpsc::Sender<T>,
    value: T,
    duration: Duration,
) -> Result<OfferStatus<T>, WaitError> {
    let timeout = Timeout::zero_is_immediate(duration);
    if timeout == Timeout::TryOnce {
        return Ok(try_offer(queue, value, false));
    }
    offer(intr, "full_offer", queue, value, timeout).await
}

/// Put `value` on a bounded queue, waiting as long as it takes for room.
///
/// Only a closed queue refuses the value.
pub async fn full_put<T>(
    intr: &Interrupt,
    queue: &mpsc::Sender<T>,
    value: T,
) -> Result<OfferStatus<T>, WaitError> {
    offer(intr, "full_put", queue, value, Timeout::wait_forever()).await
}

async fn offer<T>(
    intr: &Interrupt,
    what: &'static str,
    queue: &mpsc::Sender<T>,
    value: T,
    timeout: Timeout,
) -> Result<OfferStatus<T>, WaitError> {
    let mut guard = RetryGuard::new(intr, what, timeout);
    let out = retry_loop!(guard, |remaining| within(remaining, queue.reserve()))?;
    Ok(match out.value {
        Some(Some(Ok(permit))) => {
            permit.send(value);
            OfferStatus::taken(out.interrupted)
        }
        _ => OfferStatus::rejected(value, out.interrupted),
    })
}

pub(crate) fn try_offer<T>(queue: &mpsc::Sender<T>, value: T, interrupted: bool) -> OfferStatus<T> {
    match queue.try_send(value) {
        Ok(()) => OfferStatus::taken(interrupted),
        Err(TrySendError::Full(value)) | Err(TrySendError::Closed(value)) => {
            OfferStatus::rejected(value, interrupted)
        }
    }
}

/// Poll a bounded queue, waiting up to `duration` for a value.
///
/// Zero makes one non-blocking attempt. A closed, drained queue yields no value.
pub async fn full_poll<T>(
    intr: &Interrupt,
    queue: &mut mpsc::Receiver<T>,
    duration: Duration,
) -> Result<PollStatus<T>, WaitError> {
    let timeout = Timeout::zero_is_immediate(duration);
    if timeout == Timeout::TryOnce {
        return Ok(try_poll(queue, false));
    }
    poll(intr, "full_poll", queue, timeout).await
}

/// Take from a bounded queue, waiting as long as it takes.
///
/// Only a closed, drained queue yields no value.
pub async fn full_take<T>(
    intr: &Interrupt,
    queue: &mut mpsc::Receiver<T>,
) -> Result<PollStatus<T>, WaitError> {
    poll(intr, "full_take", queue, Timeout::wait_forever()).await
}

async fn poll<T>(
    intr: &Interrupt,
    what: &'static str,
    queue: &mut mpsc::Receiver<T>,
    timeout: Timeout,
) -> Result<PollStatus<T>, WaitError> {
    let mut guard = RetryGuard::new(intr, what, timeout);
    let out = retry_loop!(guard, |remaining| within(remaining, queue.recv()))?;
    Ok(PollStatus {
        value: out.value.flatten().flatten(),
        interrupted: out.interrupted,
    })
}

pub(crate) fn try_poll<T>(queue: &mut mpsc::Receiver<T>, interrupted: bool) -> PollStatus<T> {
    let value = match queue.try_recv() {
        Ok(value) => Some(value),
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    };
    PollStatus { value, interrupted }
}

/// Monitor-style wait: block until `notify` fires or `duration` passes;
/// zero waits until notified.
pub async fn full_wait(
    intr: &Interrupt,
    notify: &Notify,
    duration: Duration,
) -> Result<WaitStatus, WaitError> {
    let out = RetryGuard::new(intr, "full_wait", Timeout::zero_is_forever(duration))
        .run(|remaining| within(remaining, notify.notified()))
        .await?;
    Ok(WaitStatus {
        timed_out: !matches!(out.value, Some(Some(()))),
        interrupted: out.interrupted,
    })
}

/// Acquire `permits` from `semaphore`, waiting as long as it takes.
pub async fn full_acquire<'a>(
    intr: &Interrupt,
    semaphore: &'a Semaphore,
    permits: u32,
) -> Result<AcquireStatus<'a>, WaitError> {
    let out = RetryGuard::new(intr, "full_acquire", Timeout::wait_forever())
        .run(|_| semaphore.acquire_many(permits))
        .await?;
    match out.value {
        Some(Ok(permit)) => Ok(AcquireStatus {
            permit: Some(permit),
            interrupted: out.interrupted,
        }),
        Some(Err(_)) | None => Err(WaitError::Closed {
            what: "full_acquire",
        }),
    }
}

/// [`full_acquire`] of one permit that logs the fatal case with `message`
/// instead of returning it. The status then reports no permit, interrupted.
pub async fn full_acquire_logged<'a>(
    intr: &Interrupt,
    semaphore: &'a Semaphore,
    message: &str,
) -> AcquireStatus<'a> {
    match full_acquire(intr, semaphore, 1).await {
        Ok(status) => status,
        Err(e) => {
            error!("{message}: {e}");
            AcquireStatus {
                permit: None,
                interrupted: true,
            }
        }
    }
}

/// Wait for `child` to exit, as long as it takes.
pub async fn full_wait_for(
    intr: &Interrupt,
    child: &mut Child,
) -> Result<WaitForStatus, WaitError> {
    let mut guard = RetryGuard::new(intr, "full_wait_for", Timeout::wait_forever());
    let out = retry_loop!(guard, |_remaining| child.wait())?;
    let status = match out.value {
        Some(Ok(status)) => exit_code(status),
        Some(Err(e)) => {
            warn!("waiting for child process failed: {e}");
            -1
        }
        None => -1,
    };
    Ok(WaitForStatus {
        status,
        interrupted: out.interrupted,
    })
}
