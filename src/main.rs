//! bookings-sync binary
//!
//! Thin CLI over the sync library. This is the only place that maps
//! errors to process exit codes; everything below it returns `Result`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bookings_sync::{
    MySqlSourceFactory, NoopDelivery, SyncConfig, SyncOptions, SyncRunner, WatermarkStore,
    WebhookDelivery,
};
use bookings_sync::delivery::Delivery;

#[derive(Parser)]
#[command(
    name = "bookings-sync",
    about = "Sync billing/job records from MySQL to the ingestion webhook",
    version
)]
struct Cli {
    /// Ignore the watermark and re-extract the whole window
    #[arg(long)]
    full: bool,

    /// Extract and batch but send nothing and leave the watermark alone
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync (the default)
    Run,
    /// Probe the ingestion endpoint without sending any data
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    load_dotenv();

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = SyncConfig::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let options = SyncOptions {
                full_refresh: cli.full,
                dry_run: cli.dry_run,
            };

            let delivery: Box<dyn Delivery> = if cli.dry_run {
                Box::new(NoopDelivery)
            } else {
                Box::new(WebhookDelivery::new(&config.api)?)
            };

            let runner = SyncRunner::new(
                &config,
                WatermarkStore::new(config.watermark_path.clone()),
                Box::new(MySqlSourceFactory::new(
                    config.mysql.clone(),
                    config.fetch_size,
                )),
                delivery,
            );

            let report = runner.run(options).await?;
            info!(
                mode = %report.mode,
                rows = report.rows_seen,
                inserted = report.inserted,
                updated = report.updated,
                "done"
            );
            Ok(())
        }
        Commands::Check => {
            let delivery = WebhookDelivery::new(&config.api)?;
            delivery.check().await?;
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Load `.env` from the working directory, falling back to the
/// container mount location.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        info!("environment loaded from .env");
    } else if dotenvy::from_path("/app/.env").is_ok() {
        info!("environment loaded from /app/.env");
    }
}
