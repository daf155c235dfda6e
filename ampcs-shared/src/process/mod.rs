//! External process launching with drained output.

pub mod command;
pub mod handler;
pub mod launcher;
pub mod reader;

pub use command::{CommandLine, Launch, UNKNOWN};
pub use handler::{
    BitBucket, BufferLineHandler, FileLineHandler, LineHandler, StderrLineHandler,
    StdoutLineHandler, TerminationHandler,
};
pub use launcher::{LaunchState, ProcessLauncher, open_processes};
pub use reader::{LineReader, ReaderState};
