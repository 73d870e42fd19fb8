use anyhow::Result;
use clap::Parser;

use hivewatch_daemon::cli::DaemonCli;
use hivewatch_daemon::logging::init_tracing;
use hivewatch_daemon::orchestrator::{Orchestrator, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = load_config(&cli).await?;

    init_tracing(&config.general)?;

    if cli.validate {
        tracing::info!(config = %cli.config.display(), "configuration is valid");
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        store = %config.store_path().display(),
        "hivewatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("hivewatch-daemon shut down");
    Ok(())
}
