//! Where the `run` command sends a child's output.

use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use ampcs_shared::{FileLineHandler, LineHandler, StderrLineHandler, StdoutLineHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// `console`, `discard` or `file:<path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Console,
    Discard,
    File(PathBuf),
}

impl FromStr for Sink {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(Sink::Console),
            "discard" => Ok(Sink::Discard),
            _ => match s.strip_prefix("file:") {
                Some(path) if !path.is_empty() => Ok(Sink::File(PathBuf::from(path))),
                Some(_) => Err("file sink needs a path, e.g. file:out.log".to_string()),
                None => Err(format!(
                    "unknown sink `{s}`, expected console, discard or file:<path>"
                )),
            },
        }
    }
}

impl Sink {
    /// The line handler for `stream`; `None` discards.
    pub async fn handler(&self, stream: Stream) -> io::Result<Option<Arc<dyn LineHandler>>> {
        let handler: Arc<dyn LineHandler> = match (self, stream) {
            (Sink::Discard, _) => return Ok(None),
            (Sink::Console, Stream::Stdout) => Arc::new(StdoutLineHandler),
            (Sink::Console, Stream::Stderr) => Arc::new(StderrLineHandler),
            (Sink::File(path), _) => Arc::new(FileLineHandler::append(path).await?),
        };
        Ok(Some(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sinks() {
        assert_eq!("console".parse::<Sink>().unwrap(), Sink::Console);
        assert_eq!("discard".parse::<Sink>().unwrap(), Sink::Discard);
        assert_eq!(
            "file:/tmp/out.log".parse::<Sink>().unwrap(),
            Sink::File(PathBuf::from("/tmp/out.log"))
        );
        assert!("file:".parse::<Sink>().is_err());
        assert!("syslog".parse::<Sink>().is_err());
    }

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("child.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let handler = Sink::File(path.clone())
            .handler(Stream::Stdout)
            .await
            .unwrap()
            .unwrap();
        handler.handle_line("later").await.unwrap();
        drop(handler);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[tokio::test]
    async fn test_discard_has_no_handler() {
        assert!(Sink::Discard.handler(Stream::Stderr).await.unwrap().is_none());
        assert!(Sink::Console.handler(Stream::Stderr).await.unwrap().is_some());
    }
}
