//! Checked-wait wrappers: one attempt, interruption surfaced immediately.
//!
//! For call sites that treat an interrupt as a reason to stop waiting rather
//! than an accident to ride out. Zero durations follow the same table as the
//! full family.

use std::time::Duration;

use rand::Rng;
use tokio::process::Child;
use tokio::sync::{Notify, Semaphore, mpsc};

use super::Interrupt;
use super::full::{try_offer, try_poll};
use super::guard::{Timeout, within};
use super::latch::Joinable;
use super::status::{
    AcquireStatus, JoinStatus, OfferStatus, PollStatus, WaitForStatus, exit_code,
};
use crate::error::WaitError;

/// Race `fut` once against `intr`. `None` means interrupted.
async fn once<F: std::future::Future>(intr: &Interrupt, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        value = fut => Some(value),
        _ = intr.interrupted() => None,
    }
}

/// Sleep for `duration` unless interrupted first. Returns whether interrupted.
pub async fn checked_sleep(intr: &Interrupt, duration: Duration) -> bool {
    if duration.is_zero() {
        return false;
    }
    once(intr, tokio::time::sleep(duration)).await.is_none()
}

/// Checked sleep for a random duration between 1 ms and `max`.
pub async fn random_sleep(intr: &Interrupt, max: Duration) -> bool {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX).max(1);
    let millis = rand::thread_rng().gen_range(1..=max_ms);
    checked_sleep(intr, Duration::from_millis(millis)).await
}

/// Join `target` for at most `duration` (zero = until finished) unless
/// interrupted first.
pub async fn checked_join<J: Joinable>(
    intr: &Interrupt,
    target: &mut J,
    duration: Duration,
) -> JoinStatus {
    let remaining = match Timeout::zero_is_forever(duration) {
        Timeout::Within(d) => Some(d),
        _ => None,
    };
    let interrupted = once(intr, within(remaining, target.finished()))
        .await
        .is_none();
    JoinStatus {
        joined: target.is_finished(),
        interrupted,
    }
}

/// Offer `value` with one attempt of at most `duration` (zero = no waiting).
pub async fn checked_offer<T>(
    intr: &Interrupt,
    queue: &mpsc::Sender<T>,
    value: T,
    duration: Duration,
) -> OfferStatus<T> {
    if duration.is_zero() {
        return try_offer(queue, value, false);
    }
    match once(intr, within(Some(duration), queue.reserve())).await {
        Some(Some(Ok(permit))) => {
            permit.send(value);
            OfferStatus::taken(false)
        }
        Some(_) => OfferStatus::rejected(value, false),
        None => OfferStatus::rejected(value, true),
    }
}

/// Put `value`, waiting for room unless interrupted first.
pub async fn checked_put<T>(intr: &Interrupt, queue: &mpsc::Sender<T>, value: T) -> OfferStatus<T> {
    match once(intr, queue.reserve()).await {
        Some(Ok(permit)) => {
            permit.send(value);
            OfferStatus::taken(false)
        }
        Some(Err(_)) => OfferStatus::rejected(value, false),
        None => OfferStatus::rejected(value, true),
    }
}

/// Poll with one attempt of at most `duration` (zero = no waiting).
pub async fn checked_poll<T>(
    intr: &Interrupt,
    queue: &mut mpsc::Receiver<T>,
    duration: Duration,
) -> PollStatus<T> {
    if duration.is_zero() {
        return try_poll(queue, false);
    }
    match once(intr, within(Some(duration), queue.recv())).await {
        Some(value) => PollStatus {
            value: value.flatten(),
            interrupted: false,
        },
        None => PollStatus {
            value: None,
            interrupted: true,
        },
    }
}

/// Take, waiting for a value unless interrupted first.
pub async fn checked_take<T>(intr: &Interrupt, queue: &mut mpsc::Receiver<T>) -> PollStatus<T> {
    match once(intr, queue.recv()).await {
        Some(value) => PollStatus {
            value,
            interrupted: false,
        },
        None => PollStatus {
            value: None,
            interrupted: true,
        },
    }
}

/// Wait on `notify` for at most `duration` (zero = until notified).
/// Returns whether interrupted.
pub async fn checked_wait(intr: &Interrupt, notify: &Notify, duration: Duration) -> bool {
    let remaining = match Timeout::zero_is_forever(duration) {
        Timeout::Within(d) => Some(d),
        _ => None,
    };
    once(intr, within(remaining, notify.notified())).await.is_none()
}

/// Wait for `child` to exit unless interrupted first. An interrupted wait
/// reports status 1.
pub async fn checked_wait_for(intr: &Interrupt, child: &mut Child) -> WaitForStatus {
    match once(intr, child.wait()).await {
        Some(Ok(status)) => WaitForStatus {
            status: exit_code(status),
            interrupted: false,
        },
        Some(Err(_)) => WaitForStatus {
            status: -1,
            interrupted: false,
        },
        None => WaitForStatus {
            status: 1,
            interrupted: true,
        },
    }
}

/// Acquire `permits` unless interrupted first.
pub async fn checked_acquire<'a>(
    intr: &Interrupt,
    semaphore: &'a Semaphore,
    permits: u32,
) -> Result<AcquireStatus<'a>, WaitError> {
    match once(intr, semaphore.acquire_many(permits)).await {
        Some(Ok(permit)) => Ok(AcquireStatus {
            permit: Some(permit),
            interrupted: false,
        }),
        Some(Err(_)) => Err(WaitError::Closed {
            what: "checked_acquire",
        }),
        None => Ok(AcquireStatus {
            permit: None,
            interrupted: true,
        }),
    }
}
