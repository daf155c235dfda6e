//! Interrupt-robust blocking waits.
//!
//! Two tiers cover every blocking primitive used by the ground suite:
//!
//! - [`full`]: ride out spurious interrupts and wait for the whole requested
//!   duration. Fails only when the interrupt budget is spent
//!   ([`WaitError::ExcessiveInterrupt`](crate::WaitError)) or the primitive is
//!   closed.
//! - [`checked`]: one attempt; the first interrupt ends the wait and is
//!   reported to the caller.
//!
//! Interrupts come from an [`Interrupt`] handle passed to every wait.

pub mod checked;
pub mod condition;
pub mod full;
pub mod guard;
pub mod interrupt;
pub mod latch;
pub mod status;

pub use checked::{
    checked_acquire, checked_join, checked_offer, checked_poll, checked_put, checked_sleep,
    checked_take, checked_wait, checked_wait_for, random_sleep,
};
pub use condition::FullWait;
pub use full::{
    full_acquire, full_acquire_logged, full_join, full_offer, full_poll, full_put, full_sleep,
    full_sleep_logged, full_take, full_wait, full_wait_for,
};
pub use guard::{Outcome, Retry, RetryGuard, Timeout};
pub use interrupt::Interrupt;
pub use latch::{Joinable, Latch, LatchGuard, latch};
pub use status::{
    AcquireStatus, JoinStatus, OfferStatus, PollStatus, WaitForStatus, WaitStatus, exit_code,
};

/// Interrupt count at which a single full-wait fails: it absorbs
/// `MAX_INTERRUPT - 1` interrupts, and the next one is fatal unless the
/// deadline has already passed.
pub const MAX_INTERRUPT: u32 = 100;

/// Timeout reports a [`FullWait`] hands out before treating further waits as
/// a caller bug.
pub const MAX_TIMEDOUT: u32 = 1000;
