//! Result types of the wait wrappers.
//!
//! Each status carries two independent facts: whether the awaited condition
//! was satisfied, and whether any interrupt arrived while waiting.

use std::process::ExitStatus;

use tokio::sync::SemaphorePermit;

/// Result of joining a task or latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinStatus {
    pub(crate) joined: bool,
    pub(crate) interrupted: bool,
}

impl JoinStatus {
    /// The joined task has finished.
    pub fn joined(&self) -> bool {
        self.joined
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Result of offering a value to a bounded queue.
///
/// A value the queue did not take is handed back through
/// [`OfferStatus::into_rejected`].
#[derive(Debug)]
pub struct OfferStatus<T> {
    pub(crate) rejected: Option<T>,
    pub(crate) interrupted: bool,
}

impl<T> OfferStatus<T> {
    pub(crate) fn taken(interrupted: bool) -> Self {
        Self {
            rejected: None,
            interrupted,
        }
    }

    pub(crate) fn rejected(value: T, interrupted: bool) -> Self {
        Self {
            rejected: Some(value),
            interrupted,
        }
    }

    /// The queue accepted the value.
    pub fn taken_by_queue(&self) -> bool {
        self.rejected.is_none()
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn into_rejected(self) -> Option<T> {
        self.rejected
    }
}

/// Result of polling or taking from a bounded queue.
#[derive(Debug)]
pub struct PollStatus<T> {
    pub(crate) value: Option<T>,
    pub(crate) interrupted: bool,
}

impl<T> PollStatus<T> {
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Result of a monitor-style wait on a `Notify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStatus {
    pub(crate) timed_out: bool,
    pub(crate) interrupted: bool,
}

impl WaitStatus {
    /// The wait ended because its time ran out, not because it was notified.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Result of waiting for an external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitForStatus {
    pub(crate) status: i32,
    pub(crate) interrupted: bool,
}

impl WaitForStatus {
    /// Exit code as reported by [`exit_code`].
    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Result of acquiring semaphore permits.
#[derive(Debug)]
pub struct AcquireStatus<'a> {
    pub(crate) permit: Option<SemaphorePermit<'a>>,
    pub(crate) interrupted: bool,
}

impl<'a> AcquireStatus<'a> {
    pub fn acquired(&self) -> bool {
        self.permit.is_some()
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// The permits, released again when dropped. Call `forget()` on them to
    /// keep the permits taken.
    pub fn into_permit(self) -> Option<SemaphorePermit<'a>> {
        self.permit
    }
}

/// Integer exit code of a finished process.
///
/// A process killed by a signal reports `128 + signal` on Unix; a status with
/// neither code nor signal reports `-1`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_status_hands_back_rejected_value() {
        let status = OfferStatus::rejected("frame", true);
        assert!(!status.taken_by_queue());
        assert!(status.interrupted());
        assert_eq!(status.into_rejected(), Some("frame"));

        let status = OfferStatus::<&str>::taken(false);
        assert!(status.taken_by_queue());
        assert_eq!(status.into_rejected(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_maps_signals() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        // Raw wait status 9 = terminated by SIGKILL.
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
    }
}
