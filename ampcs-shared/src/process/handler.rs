//! Pluggable consumers for process output and termination.

use std::io;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::ProcessLauncher;
use crate::error::LaunchError;

/// Receives each line read from a process stream, in stream order.
///
/// Lines arrive without their terminator.
#[async_trait]
pub trait LineHandler: Send + Sync {
    async fn handle_line(&self, line: &str) -> io::Result<()>;
}

#[async_trait]
impl<F> LineHandler for F
where
    F: Fn(&str) -> io::Result<()> + Send + Sync,
{
    async fn handle_line(&self, line: &str) -> io::Result<()> {
        self(line)
    }
}

/// Discards every line. Attached to any stream nobody claims so the child
/// never blocks on a full pipe.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitBucket;

#[async_trait]
impl LineHandler for BitBucket {
    async fn handle_line(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct BufferLineHandler {
    lines: Mutex<Vec<String>>,
}

impl BufferLineHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// All lines joined with `\n`.
    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

#[async_trait]
impl LineHandler for BufferLineHandler {
    async fn handle_line(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .map_err(|_| io::Error::other("line buffer poisoned"))?
            .push(line.to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutLineHandler;

#[async_trait]
impl LineHandler for StdoutLineHandler {
    async fn handle_line(&self, line: &str) -> io::Result<()> {
        println!("{line}");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLineHandler;

#[async_trait]
impl LineHandler for StderrLineHandler {
    async fn handle_line(&self, line: &str) -> io::Result<()> {
        eprintln!("{line}");
        Ok(())
    }
}

/// Writes each line, newline-terminated, to a file.
#[derive(Debug)]
pub struct FileLineHandler {
    file: tokio::sync::Mutex<File>,
}

impl FileLineHandler {
    /// Create or truncate `path`.
    pub async fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self::from_file(file))
    }

    /// Append to `path`, creating it if needed.
    pub async fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: File) -> Self {
        Self {
            file: tokio::sync::Mutex::new(file),
        }
    }
}

#[async_trait]
impl LineHandler for FileLineHandler {
    async fn handle_line(&self, line: &str) -> io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

/// Told once how a launch attempt ended.
///
/// `exit_code` is set when the process ran and exited (including when it was
/// destroyed); `error` is set when it could not be spawned or waited for.
/// Called from the launcher's monitor task, never from the caller's.
#[async_trait]
pub trait TerminationHandler: Send + Sync {
    async fn handle_termination(
        &self,
        launcher: &ProcessLauncher,
        exit_code: Option<i32>,
        error: Option<&LaunchError>,
    );
}

#[async_trait]
impl<F> TerminationHandler for F
where
    F: Fn(&ProcessLauncher, Option<i32>, Option<&LaunchError>) + Send + Sync,
{
    async fn handle_termination(
        &self,
        launcher: &ProcessLauncher,
        exit_code: Option<i32>,
        error: Option<&LaunchError>,
    ) {
        self(launcher, exit_code, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_handler_collects_in_order() {
        let buffer = BufferLineHandler::new();
        buffer.handle_line("one").await.unwrap();
        buffer.handle_line("two").await.unwrap();
        assert_eq!(buffer.lines(), vec!["one", "two"]);
        assert_eq!(buffer.contents(), "one\ntwo");
        buffer.clear();
        assert!(buffer.lines().is_empty());
    }

    #[tokio::test]
    async fn test_bit_bucket_accepts_everything() {
        assert!(BitBucket.handle_line("ignored").await.is_ok());
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let handler = |line: &str| {
            if line.is_empty() {
                Err(io::Error::other("empty"))
            } else {
                Ok(())
            }
        };
        assert!(handler.handle_line("x").await.is_ok());
        assert!(handler.handle_line("").await.is_err());
    }

    #[tokio::test]
    async fn test_file_handler_create_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");

        let handler = FileLineHandler::create(&path).await.unwrap();
        handler.handle_line("first").await.unwrap();
        drop(handler);

        let handler = FileLineHandler::append(&path).await.unwrap();
        handler.handle_line("second").await.unwrap();
        drop(handler);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "first\nsecond\n");
    }
}
