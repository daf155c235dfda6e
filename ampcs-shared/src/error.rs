//! Error types for waits and process launching.
//!
//! - [`WaitError`] is raised by the full-wait family when a wait cannot be
//!   honored at all (as opposed to simply timing out).
//! - [`LaunchError`] covers spawn failures and launcher misuse.
//!
//! Transient interruption is never an error; it is reported through the
//! `interrupted` flag of each wait status.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single bounded wait.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The interrupt budget for one wait was exhausted before the wait could
    /// complete. Indicates an interrupt storm, never a normal timeout.
    #[error("{what}: excessive interruption ({attempts} interrupts in {elapsed:?})")]
    ExcessiveInterrupt {
        /// The wrapper that gave up.
        what: &'static str,
        /// Interrupts absorbed before giving up.
        attempts: u32,
        /// Time spent waiting before giving up.
        elapsed: Duration,
    },

    /// The underlying primitive was closed and can never be satisfied.
    #[error("{what}: primitive closed")]
    Closed { what: &'static str },

    /// A condition waiter kept waiting after being told it had timed out.
    #[error("{what}: timeout reported {count} times but caller keeps waiting")]
    TimeoutIgnored { what: &'static str, count: u32 },
}

impl WaitError {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitError::ExcessiveInterrupt { .. } => "wait_excessive_interrupt",
            WaitError::Closed { .. } => "wait_closed",
            WaitError::TimeoutIgnored { .. } => "wait_timeout_ignored",
        }
    }

    /// True for the fatal interrupt-storm condition.
    pub fn is_excessive_interrupt(&self) -> bool {
        matches!(self, WaitError::ExcessiveInterrupt { .. })
    }
}

/// Failure to launch, or misuse of, a [`ProcessLauncher`](crate::ProcessLauncher).
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum LaunchError {
    /// No program was given.
    #[error("empty command line")]
    EmptyCommand,

    /// The requested working directory does not exist.
    #[error("specified working directory does not exist: {}", dir.display())]
    MissingWorkingDir { dir: PathBuf },

    /// The OS refused to create the process.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// The exit value was requested before the process terminated.
    #[error("process has not yet terminated: {launcher}")]
    NotTerminated { launcher: String },

    /// Waiting for the process could not be completed.
    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl LaunchError {
    pub(crate) fn spawn(command: &str, source: io::Error) -> Self {
        LaunchError::Spawn {
            command: command.to_string(),
            source: Arc::new(source),
        }
    }

    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::EmptyCommand => "launch_empty_command",
            LaunchError::MissingWorkingDir { .. } => "launch_missing_working_dir",
            LaunchError::Spawn { .. } => "launch_spawn_failed",
            LaunchError::NotTerminated { .. } => "launch_not_terminated",
            LaunchError::Wait(_) => "launch_wait_failed",
        }
    }

    /// True when the OS process was never created.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(
            self,
            LaunchError::EmptyCommand
                | LaunchError::MissingWorkingDir { .. }
                | LaunchError::Spawn { .. }
        )
    }
}
