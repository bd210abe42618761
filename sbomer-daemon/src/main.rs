use anyhow::Result;
use clap::Parser;

use sbomer_core::config::SbomerConfig;
use sbomer_daemon::cli::DaemonCli;
use sbomer_daemon::logging;
use sbomer_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // file -> env overrides -> CLI overrides -> validation
    let mut config = SbomerConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration {} is valid", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        identity = %config.general.identity,
        "sbomer-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await
}
