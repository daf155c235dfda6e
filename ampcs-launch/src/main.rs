use ampcs_launch::run_cli;
use ampcs_launch::shutdown::SHUTDOWN;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            SHUTDOWN.cancel();
        }
    });

    let code = run_cli().await?;
    std::process::exit(code);
}
