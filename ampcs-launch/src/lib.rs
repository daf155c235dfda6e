pub mod cli;
pub mod config;
pub mod logging;
pub mod shutdown;
pub mod sink;

/// Entrypoint used by `main.rs`. Returns the process exit code.
pub async fn run_cli() -> anyhow::Result<i32> {
    cli::cli().await
}
