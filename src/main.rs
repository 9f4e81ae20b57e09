use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use scoreboard_reports::api::{self, AppState};
use scoreboard_reports::config::{self, AppConfig};
use scoreboard_reports::db::store::Store;
use scoreboard_reports::etl;
use scoreboard_reports::monitoring::health::HealthState;
use scoreboard_reports::monitoring::logger;
use scoreboard_reports::upstream::UpstreamClient;

#[derive(Parser)]
#[command(name = "scoreboard-reports", about = "Sports reporting service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the report API with the ETL loop in the background.
    Serve,
    /// Run the ETL loop.
    Etl {
        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load(&cli.config)?;

    logger::init_logging(&config.monitoring)?;

    tracing::info!(
        config = %cli.config.display(),
        etl_interval_s = config.etl.interval_seconds,
        "Scoreboard reports starting"
    );

    let client = Arc::new(UpstreamClient::from_config(&config.upstream, &secrets)?);
    let store = Arc::new(Store::new(&config.database.path).await?);
    let health = HealthState::new();
    let interval = Duration::from_secs(config.etl.interval_seconds);

    match cli.command {
        Command::Etl { once: true } => {
            etl::run_once(&client, &store).await?;
        }
        Command::Etl { once: false } => {
            etl::run(&client, &store, &health, interval).await;
        }
        Command::Serve => {
            let state = AppState::new(
                client.clone(),
                store.clone(),
                health.clone(),
                &secrets,
                &config.api,
            );
            let api_handle = api::spawn_api(state, &config.api.bind, config.api.port);

            tokio::select! {
                _ = etl::run(&client, &store, &health, interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown requested");
                }
            }

            api_handle.abort();
        }
    }

    Ok(())
}
