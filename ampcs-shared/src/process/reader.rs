//! Line-by-line draining of a process output stream.
//!
//! A [`LineReader`] owns one stream and forwards every line to its
//! [`LineHandler`] until end of stream or a stop request.
//!
//! Stopping is cooperative: the request is checked between lines, and a read
//! that is already waiting for data is not preempted. It finishes when the
//! stream yields data or closes, which the launcher guarantees by killing the
//! process before it joins its readers.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use super::LineHandler;
use crate::error::WaitError;
use crate::wait::{self, Interrupt, Latch};

/// Lifecycle of a [`LineReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unstarted,
    Reading,
    Stopping,
    Done,
}

pub struct LineReader {
    name: String,
    handler: Arc<dyn LineHandler>,
    state: Arc<watch::Sender<ReaderState>>,
    stop: CancellationToken,
    done: Option<Latch>,
}

impl LineReader {
    pub fn new(name: impl Into<String>, handler: Arc<dyn LineHandler>) -> Self {
        let (state, _) = watch::channel(ReaderState::Unstarted);
        Self {
            name: name.into(),
            handler,
            state: Arc::new(state),
            stop: CancellationToken::new(),
            done: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ReaderState {
        *self.state.borrow()
    }

    /// Start reading `stream` on its own task. Returns `false` if this reader
    /// was already started.
    pub fn start<R>(&mut self, stream: R) -> bool
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if self.done.is_some() {
            return false;
        }

        let (guard, done) = wait::latch();
        self.done = Some(done);
        self.state.send_replace(ReaderState::Reading);

        let handler = self.handler.clone();
        let state = self.state.clone();
        let stop = self.stop.clone();
        let span = info_span!("line_reader", name = %self.name);
        tokio::spawn(
            async move {
                let _guard = guard;
                read_lines(stream, handler.as_ref(), &stop).await;
                state.send_replace(ReaderState::Done);
            }
            .instrument(span),
        );
        true
    }

    /// Ask the reader to stop after the line it is currently reading.
    pub fn stop_reading(&self) {
        self.stop.cancel();
        self.state.send_if_modified(|state| {
            if *state == ReaderState::Reading {
                *state = ReaderState::Stopping;
                true
            } else {
                false
            }
        });
    }

    /// Block until the reader is done, however often interrupted. A reader
    /// that was never started is trivially done.
    ///
    /// Returns whether any interrupt arrived.
    pub async fn wait_for(&self, intr: &Interrupt) -> Result<bool, WaitError> {
        match &self.done {
            Some(done) => {
                let mut done = done.clone();
                let status = wait::full_join(intr, &mut done, std::time::Duration::ZERO).await?;
                Ok(status.interrupted())
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for LineReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReader")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

async fn read_lines<R>(stream: R, handler: &dyn LineHandler, stop: &CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    while !stop.is_cancelled() {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(strip_terminator(&buf));
                match handler.handle_line(&line).await {
                    Ok(()) => {}
                    Err(e) if is_stream_closed(&e) => break,
                    Err(e) => warn!("line handler failed: {e}"),
                }
            }
            Err(e) if stop.is_cancelled() => {
                debug!("stream closed during stop: {e}");
                break;
            }
            Err(e) => {
                warn!("error reading stream: {e}");
                break;
            }
        }
    }
}

fn strip_terminator(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

fn is_stream_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::BufferLineHandler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator(b"abc\n"), b"abc");
        assert_eq!(strip_terminator(b"abc\r\n"), b"abc");
        assert_eq!(strip_terminator(b"abc"), b"abc");
        assert_eq!(strip_terminator(b"\n"), b"");
    }

    #[tokio::test]
    async fn test_reads_all_lines_then_done() {
        let buffer = Arc::new(BufferLineHandler::new());
        let mut reader = LineReader::new("stdout", buffer.clone());
        assert_eq!(reader.state(), ReaderState::Unstarted);

        assert!(reader.start(&b"alpha\r\nbeta\ngamma"[..]));
        assert!(!reader.start(&b"again"[..]));

        reader.wait_for(&Interrupt::new()).await.unwrap();
        assert_eq!(reader.state(), ReaderState::Done);
        assert_eq!(buffer.lines(), vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let buffer = Arc::new(BufferLineHandler::new());
        let mut reader = LineReader::new("stderr", buffer.clone());
        reader.start(&b"ok\xff\n"[..]);
        reader.wait_for(&Interrupt::new()).await.unwrap();
        assert_eq!(buffer.lines(), vec!["ok\u{fffd}"]);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_reader() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler = move |line: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            if line == "bad" {
                Err(io::Error::other("rejected"))
            } else {
                Ok(())
            }
        };
        let mut reader = LineReader::new("stdout", Arc::new(handler));
        reader.start(&b"one\nbad\nthree\n"[..]);
        reader.wait_for(&Interrupt::new()).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_closed_stream_error_ends_reader() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler = move |_: &str| -> io::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        };
        let mut reader = LineReader::new("stdout", Arc::new(handler));
        reader.start(&b"one\ntwo\n"[..]);
        reader.wait_for(&Interrupt::new()).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_is_observed_between_lines() {
        let buffer = Arc::new(BufferLineHandler::new());
        let mut reader = LineReader::new("stdout", buffer.clone());
        let (mut tx, rx) = tokio::io::duplex(64);
        reader.start(rx);

        tx.write_all(b"first\n").await.unwrap();
        while buffer.lines().is_empty() {
            tokio::task::yield_now().await;
        }

        reader.stop_reading();
        assert_eq!(reader.state(), ReaderState::Stopping);

        // The blocked read only returns once more data (or EOF) arrives.
        tx.write_all(b"second\n").await.unwrap();
        reader.wait_for(&Interrupt::new()).await.unwrap();

        assert_eq!(reader.state(), ReaderState::Done);
        assert_eq!(buffer.lines(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_wait_for_unstarted_returns() {
        let reader = LineReader::new("stdout", Arc::new(crate::process::BitBucket));
        assert!(!reader.wait_for(&Interrupt::new()).await.unwrap());
        reader.stop_reading();
        assert_eq!(reader.state(), ReaderState::Unstarted);
    }
}
