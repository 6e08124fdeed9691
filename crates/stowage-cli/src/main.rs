//! Stowage CLI: operator commands run against the service's database and storage.
//!
//! Reads the same environment (or `.env`) as the API server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use stowage_cli::{gc_options, init_tracing, GcOverrides};
use stowage_core::Config;
use stowage_db::{PgAssetRepository, PgReferenceSource};
use stowage_services::AssetGarbageCollector;
use stowage_storage::create_storage;

#[derive(Parser)]
#[command(name = "stowage", about = "Stowage operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one garbage collection pass and print the report as JSON
    AssetsGc {
        /// Log what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,
        /// Maximum stale candidates and orphan thumbnails examined
        #[arg(long)]
        batch_limit: Option<usize>,
        /// Minimum age in seconds before an unreferenced asset is deleted
        #[arg(long)]
        grace_period_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    match cli.command {
        Commands::AssetsGc {
            dry_run,
            batch_limit,
            grace_period_secs,
        } => {
            let overrides = GcOverrides {
                dry_run,
                batch_limit,
                grace_period_secs,
            };
            let options = gc_options(config.gc(), &overrides, Utc::now());
            if options.grace_period.num_seconds() as u64 <= config.upload_url_expiry().as_secs() {
                tracing::warn!(
                    grace_period_secs = options.grace_period.num_seconds(),
                    "Grace period does not exceed the upload URL expiry; in-flight uploads may be collected"
                );
            }

            let pool = PgPoolOptions::new()
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
                .connect(config.database_url())
                .await
                .context("Failed to connect to database")?;
            let storage = create_storage(&config)
                .await
                .context("Failed to initialize storage backend")?;

            let collector = AssetGarbageCollector::new(
                Arc::new(PgAssetRepository::new(pool.clone())),
                storage,
                Arc::new(PgReferenceSource::new(
                    pool,
                    config.reference_columns().to_vec(),
                )),
            );

            let report = collector.run_once(&options).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Serialize report")?
            );

            if report.errors > 0 {
                anyhow::bail!("{} item(s) failed during collection", report.errors);
            }
        }
    }

    Ok(())
}
