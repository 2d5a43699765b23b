//! Error taxonomy for a reconciliation cycle.
//!
//! Each kind maps to one failure policy:
//! - [`FetchError`]: reading stored state or the homepage failed; aborts the cycle
//! - [`WriteError`]: a single create, update or metrics post failed; the cycle continues
//! - [`NotifyError`]: the status or log sink failed; always swallowed
//! - [`ConfigError`]: startup configuration is unusable; the only fatal kind

use thiserror::Error;

/// Failure retrieving the stored articles or the current snapshot.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Failure applying one write to the store.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Failure delivering a status update or log line.
#[derive(Error, Debug)]
#[error("Notify error: {0}")]
pub struct NotifyError(pub String);

/// Startup configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
