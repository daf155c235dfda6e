//! Interrupt-robust blocking waits and external process launching.
//!
//! [`wait`] wraps every blocking primitive the ground suite relies on so that a
//! spurious interrupt never silently shortens the caller's wait. [`process`]
//! builds on it to spawn OS processes, drain their output and report their
//! termination exactly once.

pub mod config;
pub mod error;
pub mod process;
pub mod wait;

pub use config::LauncherConfig;
pub use error::{LaunchError, WaitError};
pub use process::{
    BitBucket, BufferLineHandler, CommandLine, FileLineHandler, Launch, LaunchState, LineHandler,
    LineReader, ProcessLauncher, ReaderState, StderrLineHandler, StdoutLineHandler,
    TerminationHandler,
};
pub use wait::{Interrupt, MAX_INTERRUPT, RetryGuard, Timeout};
