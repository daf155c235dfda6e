//! Launching and supervising one external process.
//!
//! A [`ProcessLauncher`] is single use. `launch` hands the work to a monitor
//! task which spawns the process, drains stdout and stderr through
//! [`LineReader`]s, reaps the process and finally tells the termination
//! handler how it ended. Callers either return at once or wait for the exit
//! with [`ProcessLauncher::wait_for_exit`].

use std::fmt;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::watch;
use tokio::task::Id;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

use super::command::{CommandLine, Launch, UNKNOWN};
use super::handler::{BitBucket, LineHandler, TerminationHandler};
use super::reader::LineReader;
use crate::config::LauncherConfig;
use crate::error::{LaunchError, WaitError};
use crate::wait::guard::within;
use crate::wait::{self, Interrupt, JoinStatus, Latch, LatchGuard};

static OPEN_PROCESSES: AtomicUsize = AtomicUsize::new(0);

/// Number of launched processes, across all launchers, not yet reaped.
pub fn open_processes() -> usize {
    OPEN_PROCESSES.load(Ordering::SeqCst)
}

/// Lifecycle of a [`ProcessLauncher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    NotStarted,
    Starting,
    Running,
    Complete,
    Failed,
}

type HandlerSlot = Mutex<Option<Arc<dyn LineHandler>>>;
type ReaderSlot = Mutex<Option<Arc<LineReader>>>;

/// Runs one external process. Cheap to clone; clones share the process.
#[derive(Clone)]
pub struct ProcessLauncher {
    inner: Arc<Inner>,
}

struct Inner {
    intr: Interrupt,
    config: LauncherConfig,
    state: watch::Sender<LaunchState>,
    claimed: AtomicBool,
    destroyed: AtomicBool,
    kill: CancellationToken,
    command: OnceLock<CommandLine>,
    monitor: OnceLock<Latch>,
    monitor_id: OnceLock<Id>,
    exit: Mutex<Option<i32>>,
    spawn_error: Mutex<Option<LaunchError>>,
    output_handler: HandlerSlot,
    error_handler: HandlerSlot,
    output_reader: ReaderSlot,
    error_reader: ReaderSlot,
    stdin: Mutex<Option<ChildStdin>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::with_config(LauncherConfig::default())
    }

    pub fn with_config(config: LauncherConfig) -> Self {
        let (state, _) = watch::channel(LaunchState::NotStarted);
        Self {
            inner: Arc::new(Inner {
                intr: config.interrupt(),
                config,
                state,
                claimed: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
                kill: CancellationToken::new(),
                command: OnceLock::new(),
                monitor: OnceLock::new(),
                monitor_id: OnceLock::new(),
                exit: Mutex::new(None),
                spawn_error: Mutex::new(None),
                output_handler: Mutex::new(None),
                error_handler: Mutex::new(None),
                output_reader: Mutex::new(None),
                error_reader: Mutex::new(None),
                stdin: Mutex::new(None),
            }),
        }
    }

    /// Run `command` to completion on a fresh launcher with its output
    /// discarded, and return the exit code.
    pub async fn launch_simple(command: impl Into<CommandLine>) -> Result<i32, LaunchError> {
        ProcessLauncher::new()
            .launch_sync(Launch::new(command))
            .await
    }

    /// [`launch_simple`](Self::launch_simple) with a termination handler.
    pub async fn launch_simple_with(
        command: impl Into<CommandLine>,
        handler: impl TerminationHandler + 'static,
    ) -> Result<i32, LaunchError> {
        ProcessLauncher::new()
            .launch_sync(Launch::new(command).on_termination(handler))
            .await
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.inner.config
    }

    /// The handle every wait of this launcher listens to for interrupts.
    pub fn interrupter(&self) -> &Interrupt {
        &self.inner.intr
    }

    pub fn state(&self) -> LaunchState {
        *self.inner.state.borrow()
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state(), LaunchState::Running | LaunchState::Complete)
    }

    /// The process ran and was reaped.
    pub fn is_complete(&self) -> bool {
        self.state() == LaunchState::Complete
    }

    pub fn command_line(&self) -> Option<String> {
        self.inner.command.get().map(ToString::to_string)
    }

    pub fn process_name(&self) -> String {
        self.inner
            .command
            .get()
            .map(CommandLine::process_name)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Consumer of stdout lines. Takes effect for a launch that has not yet
    /// started; `None` discards the output.
    pub fn set_output_handler(&self, handler: Option<Arc<dyn LineHandler>>) {
        *lock(&self.inner.output_handler) = handler;
    }

    /// Consumer of stderr lines, like [`set_output_handler`](Self::set_output_handler).
    pub fn set_error_handler(&self, handler: Option<Arc<dyn LineHandler>>) {
        *lock(&self.inner.error_handler) = handler;
    }

    /// The exit code, without waiting.
    pub fn exit_value(&self) -> Result<i32, LaunchError> {
        let exit = self.recorded_exit();
        exit.ok_or_else(|| LaunchError::NotTerminated {
            launcher: self.to_string(),
        })
    }

    fn recorded_exit(&self) -> Option<i32> {
        *lock(&self.inner.exit)
    }

    /// Start the process described by `launch`.
    ///
    /// Returns `Ok(false)` if this launcher was already used or destroyed,
    /// and the spawn error if the process could not be created.
    pub async fn launch(&self, launch: impl Into<Launch>) -> Result<bool, LaunchError> {
        let launch = launch.into();

        if self.inner.destroyed.load(Ordering::SeqCst) {
            debug!(command = %launch.command(), "DESTROYED, not launching");
            return Ok(false);
        }
        if self.inner.claimed.swap(true, Ordering::SeqCst) {
            debug!(command = %launch.command(), "ALREADY STARTED");
            return Ok(false);
        }

        let _ = self.inner.command.set(launch.command().clone());
        self.inner.state.send_replace(LaunchState::Starting);

        let (guard, done) = wait::latch();
        let _ = self.inner.monitor.set(done);

        let span = info_span!("process", name = %launch.command().process_name());
        tokio::spawn(self.clone().monitor(launch, guard).instrument(span));

        let grace = self.inner.config.spawn_grace();
        let mut state = self.inner.state.subscribe();
        let settled = within(Some(grace), state.wait_for(|s| *s != LaunchState::Starting))
            .await
            .is_some();
        if !settled {
            warn!(process = %self.process_name(), "process not started after {grace:?}");
        }

        if let Some(err) = lock(&self.inner.spawn_error).clone() {
            return Err(err);
        }
        Ok(self.is_started())
    }

    /// [`launch`](Self::launch), then wait for the exit code. `-1` if the
    /// process was not started.
    pub async fn launch_sync(&self, launch: impl Into<Launch>) -> Result<i32, LaunchError> {
        if !self.launch(launch).await? {
            return Ok(-1);
        }
        Ok(self.wait_for_exit().await)
    }

    /// Wait however long the process runs and return its exit code, or `-1`
    /// if none was recorded.
    pub async fn wait_for_exit(&self) -> i32 {
        if let Err(e) = self.join().await {
            error!(process = %self.process_name(), "waiting for process exit failed: {e}");
        }
        self.recorded_exit().unwrap_or(-1)
    }

    /// Join the monitor task.
    pub async fn join(&self) -> Result<JoinStatus, WaitError> {
        self.join_timeout(Duration::ZERO).await
    }

    /// Join the monitor task for at most `duration`; zero waits until it
    /// finishes. Joining from the monitor itself returns at once.
    pub async fn join_timeout(&self, duration: Duration) -> Result<JoinStatus, WaitError> {
        let Some(done) = self.inner.monitor.get() else {
            return Ok(JoinStatus {
                joined: true,
                interrupted: false,
            });
        };
        if self.on_monitor() {
            return Ok(JoinStatus {
                joined: done.is_released(),
                interrupted: false,
            });
        }
        let mut done = done.clone();
        wait::full_join(&self.inner.intr, &mut done, duration).await
    }

    /// Kill the process and release everything it holds. Idempotent, and a
    /// no-op before launch. The launcher cannot be launched afterwards.
    pub async fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.cleanup().await;
    }

    fn on_monitor(&self) -> bool {
        match (tokio::task::try_id(), self.inner.monitor_id.get()) {
            (Some(current), Some(monitor)) => current == *monitor,
            _ => false,
        }
    }

    async fn cleanup(&self) {
        let output = lock(&self.inner.output_reader).take();
        let error = lock(&self.inner.error_reader).take();
        for reader in [&output, &error].into_iter().flatten() {
            reader.stop_reading();
        }

        drop(lock(&self.inner.stdin).take());
        self.inner.kill.cancel();

        if !self.on_monitor() {
            if let Some(done) = self.inner.monitor.get() {
                let mut done = done.clone();
                let wait = self.inner.config.destroy_wait();
                match wait::full_join(&self.inner.intr, &mut done, wait).await {
                    Ok(status) if !status.joined() => {
                        warn!(
                            process = %self.process_name(),
                            "monitor still running {wait:?} after kill"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!(process = %self.process_name(), "joining monitor failed: {e}"),
                }
            }
        }

        for reader in [output, error].into_iter().flatten() {
            if let Err(e) = reader.wait_for(&self.inner.intr).await {
                error!(reader = reader.name(), "joining line reader failed: {e}");
            }
        }
    }

    async fn monitor(self, launch: Launch, done: LatchGuard) {
        let _done = done;
        if let Some(id) = tokio::task::try_id() {
            let _ = self.inner.monitor_id.set(id);
        }

        let (exit, err) = match self.spawn(&launch).await {
            Ok(child) => self.supervise(child).await,
            Err(e) => {
                error!(command = %launch.command(), "{e}");
                *lock(&self.inner.spawn_error) = Some(e.clone());
                self.inner.state.send_replace(LaunchState::Failed);
                (None, Some(e))
            }
        };

        if let Some(handler) = launch.termination_handler() {
            handler.handle_termination(&self, exit, err.as_ref()).await;
        }
        self.cleanup().await;
    }

    async fn spawn(&self, launch: &Launch) -> Result<Child, LaunchError> {
        let command = launch.command();
        let argv = command.argv();
        let Some((program, args)) = argv.split_first().filter(|_| !command.is_empty()) else {
            return Err(LaunchError::EmptyCommand);
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = launch.dir() {
            let is_dir = tokio::fs::metadata(dir)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(LaunchError::MissingWorkingDir {
                    dir: dir.to_path_buf(),
                });
            }
            cmd.current_dir(dir);
        }

        cmd.spawn()
            .map_err(|e| LaunchError::spawn(&command.to_string(), e))
    }

    async fn supervise(&self, mut child: Child) -> (Option<i32>, Option<LaunchError>) {
        let output = start_reader("stdout", child.stdout.take(), &self.inner.output_handler);
        let error = start_reader("stderr", child.stderr.take(), &self.inner.error_handler);
        *lock(&self.inner.output_reader) = output;
        *lock(&self.inner.error_reader) = error;
        *lock(&self.inner.stdin) = child.stdin.take();

        OPEN_PROCESSES.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_replace(LaunchState::Running);
        debug!(pid = ?child.id(), "STARTED");

        let waited = tokio::select! {
            biased;
            _ = self.inner.kill.cancelled() => None,
            result = wait::full_wait_for(&self.inner.intr, &mut child) => Some(result),
        };
        let result = match waited {
            Some(result) => result,
            None => {
                debug!("KILLING");
                if let Err(e) = child.start_kill() {
                    debug!("kill failed: {e}");
                }
                wait::full_wait_for(&self.inner.intr, &mut child).await
            }
        };
        OPEN_PROCESSES.fetch_sub(1, Ordering::SeqCst);

        let outcome = match result {
            Ok(status) => {
                let code = status.status();
                *lock(&self.inner.exit) = Some(code);
                self.inner.state.send_replace(LaunchState::Complete);
                debug!(exit = code, "COMPLETED");
                (Some(code), None)
            }
            Err(e) => {
                error!("waiting for process failed: {e}");
                let _ = child.start_kill();
                self.inner.state.send_replace(LaunchState::Failed);
                (None, Some(LaunchError::from(e)))
            }
        };

        let readers = [
            lock(&self.inner.output_reader).clone(),
            lock(&self.inner.error_reader).clone(),
        ];
        for reader in readers.into_iter().flatten() {
            if let Err(e) = reader.wait_for(&self.inner.intr).await {
                warn!(reader = reader.name(), "joining line reader failed: {e}");
            }
        }
        outcome
    }
}

fn start_reader<R>(name: &str, stream: Option<R>, handler: &HandlerSlot) -> Option<Arc<LineReader>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let stream = stream?;
    let handler = lock(handler)
        .clone()
        .unwrap_or_else(|| Arc::new(BitBucket) as Arc<dyn LineHandler>);
    let mut reader = LineReader::new(name, handler);
    reader.start(stream);
    Some(Arc::new(reader))
}

impl fmt::Display for ProcessLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exit = self
            .recorded_exit()
            .map_or_else(|| "N/A".to_string(), |code| code.to_string());
        let present = |slot: &ReaderSlot| -> &'static str {
            if lock(slot).is_some() { "YES" } else { "NO" }
        };
        write!(
            f,
            concat!(
                "ProcessLauncher: ({}) [openProcesses={}, started={}, complete={}, ",
                "exitValue={}, outputReader={}, errorReader={}]"
            ),
            self.process_name(),
            open_processes(),
            self.is_started(),
            self.is_complete(),
            exit,
            present(&self.inner.output_reader),
            present(&self.inner.error_reader),
        )
    }
}

impl fmt::Debug for ProcessLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessLauncher")
            .field("process", &self.process_name())
            .field("state", &self.state())
            .field("exit", &self.recorded_exit())
            .finish()
    }
}
