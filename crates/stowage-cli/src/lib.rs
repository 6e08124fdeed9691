//! Shared helpers for the `stowage` operator binary.

use chrono::{DateTime, Utc};
use stowage_core::GcConfig;
use stowage_services::GcOptions;

/// Command-line overrides for a collection pass.
#[derive(Debug, Clone, Default)]
pub struct GcOverrides {
    pub dry_run: bool,
    pub batch_limit: Option<usize>,
    pub grace_period_secs: Option<u64>,
}

/// Options for one pass: configured values with command-line overrides applied.
pub fn gc_options(config: &GcConfig, overrides: &GcOverrides, now: DateTime<Utc>) -> GcOptions {
    let config = GcConfig {
        batch_limit: overrides.batch_limit.unwrap_or(config.batch_limit),
        grace_period_secs: overrides
            .grace_period_secs
            .unwrap_or(config.grace_period_secs),
        ..config.clone()
    };
    GcOptions {
        dry_run: overrides.dry_run,
        ..GcOptions::from_config(&config, now)
    }
}

/// Initialize tracing for CLI binaries. Logs go to stderr so stdout carries only the report.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
