//! Joinable completion signals.
//!
//! A [`Latch`] is released exactly once, when its [`LatchGuard`] is released
//! or dropped, so a task holding the guard releases its joiners even when it
//! panics. Any number of cloned latches may wait on it concurrently, which a
//! `JoinHandle` cannot offer.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Something a caller can wait to finish.
pub trait Joinable {
    fn is_finished(&self) -> bool;

    /// Resolves once finished. Cancel safe; may be called again after it
    /// resolved, in which case it resolves immediately.
    fn finished(&mut self) -> impl Future<Output = ()> + Send + '_;
}

/// Create a connected guard/latch pair.
pub fn latch() -> (LatchGuard, Latch) {
    let (tx, rx) = watch::channel(false);
    (LatchGuard { tx }, Latch { rx })
}

/// Releasing side of a [`Latch`].
#[derive(Debug)]
pub struct LatchGuard {
    tx: watch::Sender<bool>,
}

impl LatchGuard {
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

/// Waiting side of a [`LatchGuard`].
#[derive(Debug, Clone)]
pub struct Latch {
    rx: watch::Receiver<bool>,
}

impl Latch {
    pub fn is_released(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn released(&self) {
        let mut rx = self.rx.clone();
        // The guard publishes `true` before the sender goes away, so an error
        // here still means released.
        let _ = rx.wait_for(|released| *released).await;
    }
}

impl Joinable for Latch {
    fn is_finished(&self) -> bool {
        self.is_released()
    }

    fn finished(&mut self) -> impl Future<Output = ()> + Send + '_ {
        self.released()
    }
}

impl<T: Send + 'static> Joinable for JoinHandle<T> {
    fn is_finished(&self) -> bool {
        JoinHandle::is_finished(self)
    }

    fn finished(&mut self) -> impl Future<Output = ()> + Send + '_ {
        async move {
            // A finished handle may already have had its output taken; polling
            // it again would panic.
            if !JoinHandle::is_finished(self) {
                let _ = self.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_latch_releases_on_drop() {
        let (guard, latch) = latch();
        assert!(!latch.is_released());

        let waiter = latch.clone();
        let task = tokio::spawn(async move { waiter.released().await });
        drop(guard);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("latch should release")
            .unwrap();
        assert!(latch.is_released());
    }

    #[tokio::test]
    async fn test_latch_releases_when_holder_panics() {
        let (guard, latch) = latch();
        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("boom");
        });
        assert!(task.await.is_err());
        assert!(latch.is_released());
    }

    #[tokio::test]
    async fn test_join_handle_finished_can_be_awaited_twice() {
        let mut handle = tokio::spawn(async { 5 });
        handle.finished().await;
        assert!(Joinable::is_finished(&handle));
        handle.finished().await;
    }
}
