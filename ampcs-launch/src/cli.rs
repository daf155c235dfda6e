use std::path::PathBuf;
use std::time::Duration;

use ampcs_shared::wait;
use ampcs_shared::{CommandLine, Interrupt, Launch, LauncherConfig, ProcessLauncher};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::CliConfig;
use crate::logging;
use crate::shutdown::SHUTDOWN;
use crate::sink::{Sink, Stream};

#[derive(Parser)]
#[command(name = "ampcs-launch")]
#[command(version, about = "Launch and supervise ground tools", long_about = None)]
struct Cli {
    /// Configuration file [default: <config dir>/ampcs/launch.json]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and exit with its exit code
    Run {
        /// Working directory of the command
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Where stdout lines go: console, discard or file:<path>
        #[arg(long, default_value = "console")]
        stdout: Sink,

        /// Where stderr lines go: console, discard or file:<path>
        #[arg(long, default_value = "console")]
        stderr: Sink,

        /// Treat the arguments as one command line split on whitespace
        #[arg(long)]
        string: bool,

        /// The command and its arguments
        #[arg(last = true, required = true)]
        args: Vec<String>,
    },

    /// Sleep for the full duration; SIGUSR1 delivers a spurious interrupt
    Sleep {
        /// Duration in milliseconds
        millis: u64,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to the configuration file
        #[arg(long)]
        save: bool,
    },
}

/// Options of the `run` command.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdout: Sink,
    pub stderr: Sink,
    pub string: bool,
}

impl RunRequest {
    fn command(&self) -> CommandLine {
        if self.string {
            CommandLine::from(self.args.join(" "))
        } else {
            CommandLine::from(self.args.clone())
        }
    }
}

pub async fn cli() -> Result<i32> {
    let cli = Cli::parse();

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => CliConfig::default_path()?,
    };
    let config = CliConfig::load(&path)?;
    logging::init_tracing(cli.log_level.as_deref().unwrap_or(&config.log_level));
    if path.exists() {
        info!("Loaded config from: {:?}", path);
    } else {
        warn!("Config file {:?} not found, using defaults", path);
    }

    match cli.command {
        Commands::Run {
            cwd,
            stdout,
            stderr,
            string,
            args,
        } => {
            let request = RunRequest {
                args,
                cwd,
                stdout,
                stderr,
                string,
            };
            run(&config.launcher, request).await
        }
        Commands::Sleep { millis } => sleep(&config.launcher, Duration::from_millis(millis)).await,
        Commands::Config { save } => {
            let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{json}");
            if save {
                config.save(&path)?;
            }
            Ok(0)
        }
    }
}

/// Run one command to completion. Ctrl+C destroys it.
pub async fn run(config: &LauncherConfig, request: RunRequest) -> Result<i32> {
    let mut launch = Launch::new(request.command());
    if let Some(dir) = &request.cwd {
        launch = launch.working_dir(dir);
    }

    let launcher = ProcessLauncher::with_config(config.clone());
    launcher.set_output_handler(
        request
            .stdout
            .handler(Stream::Stdout)
            .await
            .context("Failed to open stdout sink")?,
    );
    launcher.set_error_handler(
        request
            .stderr
            .handler(Stream::Stderr)
            .await
            .context("Failed to open stderr sink")?,
    );

    let started = launcher
        .launch(launch)
        .await
        .with_context(|| format!("Failed to launch {}", request.command()))?;
    if !started {
        bail!("Process did not start: {launcher}");
    }

    let code = tokio::select! {
        code = launcher.wait_for_exit() => code,
        _ = SHUTDOWN.cancelled() => {
            warn!("Shutdown requested, destroying {}", launcher.process_name());
            launcher.destroy().await;
            launcher.exit_value().unwrap_or(-1)
        }
    };
    info!("{} exited with {code}", launcher.process_name());
    Ok(code)
}

/// Full sleep that reports whether it was interrupted on the way.
pub async fn sleep(config: &LauncherConfig, duration: Duration) -> Result<i32> {
    let intr = config.interrupt();
    let relay = tokio::spawn(relay_interrupts(intr.clone()));
    let start = Instant::now();

    let result = tokio::select! {
        result = wait::full_sleep(&intr, duration) => result,
        _ = SHUTDOWN.cancelled() => {
            relay.abort();
            bail!("Sleep cancelled after {:?}", start.elapsed());
        }
    };
    relay.abort();

    let interrupted = result.context("Full sleep failed")?;
    println!("slept {:?} (interrupted: {interrupted})", start.elapsed());
    Ok(0)
}

#[cfg(unix)]
async fn relay_interrupts(intr: Interrupt) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(usr1) => usr1,
        Err(e) => {
            warn!("Cannot listen for SIGUSR1: {e}");
            return;
        }
    };
    while usr1.recv().await.is_some() {
        debug!("SIGUSR1 received, interrupting");
        intr.interrupt();
    }
}

#[cfg(not(unix))]
async fn relay_interrupts(_intr: Interrupt) {
    std::future::pending::<()>().await
}
