use std::sync::Arc;
use std::time::Duration;

use ampcs_shared::wait::{self, FullWait, latch};
use ampcs_shared::{Interrupt, WaitError};
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::time::Instant;

/// Deliver `count` interrupts, one every `every`.
fn storm(intr: &Interrupt, every: Duration, count: u32) -> tokio::task::JoinHandle<()> {
    let intr = intr.clone();
    tokio::spawn(async move {
        for _ in 0..count {
            tokio::time::sleep(every).await;
            intr.interrupt();
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_sleep_keeps_full_budget_under_interrupts() {
    let intr = Interrupt::with_budget(10);
    let start = Instant::now();
    let noise = storm(&intr, Duration::from_millis(15), 9);

    let interrupted = wait::full_sleep(&intr, Duration::from_millis(200)).await.unwrap();
    assert!(interrupted);
    assert!(start.elapsed() >= Duration::from_millis(200));
    noise.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhaustion_is_not_a_timeout() {
    let intr = Interrupt::with_budget(3);
    let _noise = storm(&intr, Duration::from_millis(1), 3);

    let err = wait::full_sleep(&intr, Duration::from_secs(60)).await.unwrap_err();
    match err {
        WaitError::ExcessiveInterrupt { what, attempts, .. } => {
            assert_eq!(what, "full_sleep");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_producer_consumer_survive_interrupts() {
    let intr = Interrupt::new();
    let (tx, mut rx) = mpsc::channel::<u32>(1);
    let noise = storm(&intr, Duration::from_millis(3), 20);

    let producer_intr = intr.clone();
    let producer = tokio::spawn(async move {
        for i in 0..10 {
            let status = wait::full_put(&producer_intr, &tx, i).await.unwrap();
            assert!(status.taken_by_queue());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let mut received = Vec::new();
    for _ in 0..10 {
        let status = wait::full_take(&intr, &mut rx).await.unwrap();
        received.push(status.into_value().unwrap());
    }
    assert_eq!(received, (0..10).collect::<Vec<_>>());

    producer.await.unwrap();
    noise.await.unwrap();
}

#[tokio::test]
async fn test_zero_offer_and_poll_do_not_block() {
    let intr = Interrupt::new();
    let (tx, mut rx) = mpsc::channel(1);

    let empty = wait::full_poll::<u8>(&intr, &mut rx, Duration::ZERO).await.unwrap();
    assert!(empty.value().is_none());
    assert!(wait::full_offer(&intr, &tx, 1u8, Duration::ZERO).await.unwrap().taken_by_queue());
    let refused = wait::full_offer(&intr, &tx, 2u8, Duration::ZERO).await.unwrap();
    assert_eq!(refused.into_rejected(), Some(2));
    let taken = wait::full_poll(&intr, &mut rx, Duration::ZERO).await.unwrap();
    assert_eq!(taken.into_value(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_checked_sleep_stops_at_first_interrupt() {
    let intr = Interrupt::new();
    let start = Instant::now();
    let _noise = storm(&intr, Duration::from_millis(10), 1);

    assert!(wait::checked_sleep(&intr, Duration::from_secs(5)).await);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_acquire_waits_for_release() {
    let intr = Interrupt::new();
    let semaphore = Arc::new(Semaphore::new(1));
    let held = semaphore.clone().acquire_owned().await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        drop(held);
    });
    let _noise = storm(&intr, Duration::from_millis(5), 4);

    let start = Instant::now();
    let status = wait::full_acquire(&intr, &semaphore, 1).await.unwrap();
    assert!(status.acquired());
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[tokio::test(start_paused = true)]
async fn test_join_latch_with_many_joiners() {
    let intr = Interrupt::new();
    let (guard, done) = latch();

    let joiners: Vec<_> = (0..3)
        .map(|_| {
            let mut done = done.clone();
            let intr = intr.clone();
            tokio::spawn(async move {
                wait::full_join(&intr, &mut done, Duration::ZERO)
                    .await
                    .unwrap()
                    .joined()
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(25)).await;
    guard.release();
    for joiner in joiners {
        assert!(joiner.await.unwrap());
    }
}

#[tokio::test(start_paused = true)]
async fn test_condition_wait_until_predicate() {
    let intr = Interrupt::new();
    let notify = Arc::new(Notify::new());
    let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));

    let (n, c) = (notify.clone(), counter.clone());
    tokio::spawn(async move {
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            n.notify_one();
        }
    });

    let mut waiter = FullWait::new(&intr, &notify, Duration::from_secs(1));
    while counter.load(std::sync::atomic::Ordering::SeqCst) < 3 {
        assert!(!waiter.wait().await.unwrap().timed_out());
    }
}
