//! # Premium Watch
//!
//! Tracks paywalled ("premium") articles on a news homepage and records when
//! they become free to read, together with how many hours they spent behind
//! the paywall.
//!
//! ## Usage
//!
//! ```sh
//! # one cycle, driven by cron or a systemd timer
//! premium_watch --api-base http://localhost:8000/api --api-key KEY
//!
//! # self-scheduled, one cycle every five minutes
//! premium_watch --watch-secs 300
//! ```
//!
//! ## Architecture
//!
//! Each cycle follows the same pipeline:
//! 1. **Fetching**: Load known articles from the store and scrape the homepage
//! 2. **Reconciling**: Diff both sets into creates and premium-to-free transitions
//! 3. **Writing**: Apply every operation individually, then post run metrics
//! 4. **Reporting**: Push a final status and log line for the cycle

use clap::Parser;
use std::error::Error;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod config;
mod error;
mod metrics;
mod models;
mod reconcile;
mod scrapers;
mod sync;
mod utils;

use api::ApiClient;
use cli::Cli;
use config::{FileConfig, Settings};
use error::ConfigError;
use scrapers::homepage::HomepageSource;
use sync::Orchestrator;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("premium_watch starting up");

    let args = Cli::parse();
    debug!(config = ?args.config, "Parsed CLI arguments");

    let file = match &args.config {
        Some(path) => {
            let file = FileConfig::load(path).await?;
            info!(config_path = %path, "Loaded configuration");
            file
        }
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&args, file)?;
    info!(
        api_base = %settings.api_base,
        homepage = %settings.homepage_url,
        source_id = %settings.source_id,
        timezone = settings.timezone.name(),
        timeout_secs = settings.timeout.as_secs(),
        "Settings resolved"
    );

    let api = ApiClient::new(&settings.api_base, &settings.api_key, settings.timeout)
        .map_err(ConfigError::from)?;
    let source = HomepageSource::new(settings.homepage_url.clone(), settings.timeout)
        .map_err(ConfigError::from)?;
    let mut orchestrator =
        Orchestrator::new(source, api, &settings.source_id, &settings.site_name)
            .with_timezone(settings.timezone);

    match settings.watch_interval {
        None => {
            let report = orchestrator.run_cycle().await;
            info!(
                status = %report.status(),
                started_at = %report.started_at,
                metrics_posted = report.metrics_posted,
                failed_writes = report.failures.len(),
                phase = %orchestrator.phase(),
                "Single cycle finished"
            );
        }
        Some(every) => {
            info!(every_secs = every.as_secs(), "Watch mode: running cycles until stopped");
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        orchestrator.run_cycle().await;
                    }
                    _ = &mut shutdown => {
                        info!("Shutdown requested");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
