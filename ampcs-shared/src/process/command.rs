//! Command lines and launch requests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::TerminationHandler;

/// Process name reported before a command is known.
pub const UNKNOWN: &str = "<UNKNOWN>";

/// The program to run, either as an argument vector or as one line that is
/// split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Argv(Vec<String>),
    Line(String),
}

impl CommandLine {
    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        match self {
            CommandLine::Argv(argv) => argv.clone(),
            CommandLine::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Argv(argv) => argv.first().is_none_or(|p| p.trim().is_empty()),
            CommandLine::Line(line) => line.trim().is_empty(),
        }
    }

    /// Last path component of the program, or [`UNKNOWN`].
    pub fn process_name(&self) -> String {
        let program = match self {
            CommandLine::Argv(argv) => argv.first().map(String::as_str),
            CommandLine::Line(line) => line.split_whitespace().next(),
        };
        program
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .and_then(|p| Path::new(p).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Argv(argv) => write!(f, "{}", argv.join(" ")),
            CommandLine::Line(line) => write!(f, "{line}"),
        }
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(argv: Vec<String>) -> Self {
        CommandLine::Argv(argv)
    }
}

impl From<&[&str]> for CommandLine {
    fn from(argv: &[&str]) -> Self {
        CommandLine::Argv(argv.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(argv: [&str; N]) -> Self {
        CommandLine::from(&argv[..])
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        CommandLine::Line(line.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        CommandLine::Line(line)
    }
}

/// Builder for one launch request.
///
/// ```
/// use ampcs_shared::Launch;
///
/// let launch = Launch::new(["/bin/ls", "-l"]).working_dir("/tmp");
/// assert_eq!(launch.command().process_name(), "ls");
/// ```
#[derive(Clone)]
pub struct Launch {
    command: CommandLine,
    working_dir: Option<PathBuf>,
    on_termination: Option<Arc<dyn TerminationHandler>>,
}

impl Launch {
    pub fn new(command: impl Into<CommandLine>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            on_termination: None,
        }
    }

    /// Run the process in `dir`, which must exist.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn on_termination(mut self, handler: impl TerminationHandler + 'static) -> Self {
        self.on_termination = Some(Arc::new(handler));
        self
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub(crate) fn termination_handler(&self) -> Option<Arc<dyn TerminationHandler>> {
        self.on_termination.clone()
    }
}

impl fmt::Debug for Launch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Launch")
            .field("command", &self.command)
            .field("working_dir", &self.working_dir)
            .field("on_termination", &self.on_termination.is_some())
            .finish()
    }
}

impl From<CommandLine> for Launch {
    fn from(command: CommandLine) -> Self {
        Launch::new(command)
    }
}

impl From<Vec<String>> for Launch {
    fn from(argv: Vec<String>) -> Self {
        Launch::new(argv)
    }
}

impl From<&[&str]> for Launch {
    fn from(argv: &[&str]) -> Self {
        Launch::new(argv)
    }
}

impl<const N: usize> From<[&str; N]> for Launch {
    fn from(argv: [&str; N]) -> Self {
        Launch::new(argv)
    }
}

impl From<&str> for Launch {
    fn from(line: &str) -> Self {
        Launch::new(line)
    }
}

impl From<String> for Launch {
    fn from(line: String) -> Self {
        Launch::new(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LaunchError, ProcessLauncher};

    #[test]
    fn test_line_is_split_on_whitespace() {
        let command = CommandLine::from("  /bin/echo   hello\tworld ");
        assert_eq!(command.argv(), vec!["/bin/echo", "hello", "world"]);
        assert_eq!(command.process_name(), "echo");
    }

    #[test]
    fn test_process_name() {
        assert_eq!(CommandLine::from(["/usr/bin/python3", "x.py"]).process_name(), "python3");
        assert_eq!(CommandLine::from(["chill_down"]).process_name(), "chill_down");
        assert_eq!(CommandLine::from("").process_name(), UNKNOWN);
        assert_eq!(CommandLine::Argv(vec![]).process_name(), UNKNOWN);
    }

    #[test]
    fn test_empty_commands() {
        assert!(CommandLine::from("   ").is_empty());
        assert!(CommandLine::Argv(vec![]).is_empty());
        assert!(CommandLine::Argv(vec![" ".to_string()]).is_empty());
        assert!(!CommandLine::from(["/bin/true"]).is_empty());
    }

    #[test]
    fn test_display_joins_argv() {
        let command = CommandLine::from(["/bin/echo", "a", "b"]);
        assert_eq!(command.to_string(), "/bin/echo a b");
    }

    #[test]
    fn test_launch_builder() {
        let launch = Launch::from(vec!["/bin/sh".to_string(), "-c".to_string(), "true".to_string()])
            .working_dir("/tmp")
            .on_termination(|_: &ProcessLauncher, _: Option<i32>, _: Option<&LaunchError>| {});
        assert_eq!(launch.dir(), Some(Path::new("/tmp")));
        assert!(launch.termination_handler().is_some());
        assert_eq!(launch.command().process_name(), "sh");
    }
}
