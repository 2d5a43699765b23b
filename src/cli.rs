//! Command-line interface definitions for Premium Watch.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most arguments can also be provided via environment variables, and all of
//! them via the optional YAML config file (see [`crate::config`]).

use clap::Parser;

/// Command-line arguments for the Premium Watch application.
///
/// Values left unset here fall back to the config file, then to built-in
/// defaults.
///
/// # Examples
///
/// ```sh
/// # One cycle, e.g. from cron every 5 minutes
/// premium_watch --api-base http://localhost:8000/api --api-key KEY
///
/// # Keep running, one cycle every 300 seconds
/// premium_watch --watch-secs 300
///
/// # Settings from a file
/// premium_watch -c ./premium_watch.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Base URL of the persistence API
    #[arg(long, env = "SEHBMASTER_API")]
    pub api_base: Option<String>,

    /// API key sent with every write
    #[arg(long, env = "SEHBMASTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Identifier of this scraper in status reports
    #[arg(long, env = "RASPBERRY_ID")]
    pub source_id: Option<String>,

    /// Homepage to take snapshots from
    #[arg(long, env = "HOMEPAGE_URL")]
    pub homepage_url: Option<String>,

    /// Timeout for every HTTP request, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Run a cycle every N seconds instead of once
    #[arg(long, env = "WATCH_SECS")]
    pub watch_secs: Option<u64>,

    /// IANA zone for times in status messages (default: Europe/Berlin)
    #[arg(long, env = "STATUS_TIMEZONE")]
    pub timezone: Option<String>,
}
