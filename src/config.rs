//! Runtime settings resolved from the CLI, an optional YAML file and defaults.
//!
//! Precedence, highest first: command line / environment, config file,
//! built-in defaults.
//!
//! ```yaml
//! api_base: http://188.245.189.141:8000/api
//! api_key: change-me
//! source_id: z0
//! homepage_url: https://www.bild.de/
//! site_name: BILD
//! timeout_secs: 12
//! watch_secs: 300
//! timezone: Europe/Berlin
//! ```

use crate::cli::Cli;
use crate::error::ConfigError;
use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_API_KEY: &str = "dev-secret";
pub const DEFAULT_SOURCE_ID: &str = "z0";
pub const DEFAULT_HOMEPAGE_URL: &str = "https://www.bild.de/";
pub const DEFAULT_SITE_NAME: &str = "BILD";
pub const DEFAULT_TIMEOUT_SECS: u64 = 12;
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

/// Contents of the YAML config file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub source_id: Option<String>,
    pub homepage_url: Option<String>,
    pub site_name: Option<String>,
    pub timeout_secs: Option<u64>,
    pub watch_secs: Option<u64>,
    pub timezone: Option<String>,
}

impl FileConfig {
    pub fn from_yaml(path: &str, text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })
    }

    pub async fn load(path: &str) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_string(),
                source,
            })?;
        Self::from_yaml(path, &text)
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base: String,
    pub api_key: String,
    pub source_id: String,
    pub homepage_url: Url,
    pub site_name: String,
    /// Zone for wall-clock times in status messages.
    pub timezone: Tz,
    pub timeout: Duration,
    /// `None` runs a single cycle and exits.
    pub watch_interval: Option<Duration>,
}

impl Settings {
    /// Merge CLI values over file values over defaults.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let homepage = cli
            .homepage_url
            .clone()
            .or(file.homepage_url)
            .unwrap_or_else(|| DEFAULT_HOMEPAGE_URL.to_string());
        let homepage_url =
            Url::parse(&homepage).map_err(|e| ConfigError::InvalidUrl(format!("{homepage}: {e}")))?;

        let api_base = cli
            .api_base
            .clone()
            .or(file.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Url::parse(&api_base).map_err(|e| ConfigError::InvalidUrl(format!("{api_base}: {e}")))?;

        let timeout_secs = cli
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .max(1);

        let timezone = match cli.timezone.clone().or(file.timezone) {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name))?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Self {
            api_base,
            api_key: cli
                .api_key
                .clone()
                .or(file.api_key)
                .unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
            source_id: cli
                .source_id
                .clone()
                .or(file.source_id)
                .unwrap_or_else(|| DEFAULT_SOURCE_ID.to_string()),
            homepage_url,
            site_name: file
                .site_name
                .unwrap_or_else(|| DEFAULT_SITE_NAME.to_string()),
            timezone,
            timeout: Duration::from_secs(timeout_secs),
            watch_interval: cli
                .watch_secs
                .or(file.watch_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["premium_watch"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn bare_cli() -> Cli {
        Cli {
            config: None,
            api_base: None,
            api_key: None,
            source_id: None,
            homepage_url: None,
            timeout_secs: None,
            watch_secs: None,
            timezone: None,
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(&bare_cli(), FileConfig::default()).unwrap();
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.api_key, DEFAULT_API_KEY);
        assert_eq!(settings.source_id, DEFAULT_SOURCE_ID);
        assert_eq!(settings.homepage_url.as_str(), DEFAULT_HOMEPAGE_URL);
        assert_eq!(settings.site_name, "BILD");
        assert_eq!(settings.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(settings.timeout, Duration::from_secs(12));
        assert_eq!(settings.watch_interval, None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = FileConfig::from_yaml(
            "test.yaml",
            "api_base: http://store:9000/api\nsource_id: pi-3\nwatch_secs: 300\nsite_name: Welt\n",
        )
        .unwrap();
        let settings = Settings::resolve(&bare_cli(), file).unwrap();
        assert_eq!(settings.api_base, "http://store:9000/api");
        assert_eq!(settings.source_id, "pi-3");
        assert_eq!(settings.site_name, "Welt");
        assert_eq!(settings.watch_interval, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig {
            api_base: Some("http://file/api".to_string()),
            timeout_secs: Some(30),
            ..Default::default()
        };
        let settings = Settings::resolve(
            &cli(&["--api-base", "http://cli/api", "--timeout-secs", "5"]),
            file,
        )
        .unwrap();
        assert_eq!(settings.api_base, "http://cli/api");
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_watch_means_single_run() {
        let mut c = bare_cli();
        c.watch_secs = Some(0);
        let settings = Settings::resolve(&c, FileConfig::default()).unwrap();
        assert_eq!(settings.watch_interval, None);
    }

    #[test]
    fn test_invalid_urls_rejected() {
        let mut c = bare_cli();
        c.homepage_url = Some("not a url".to_string());
        assert!(matches!(
            Settings::resolve(&c, FileConfig::default()),
            Err(ConfigError::InvalidUrl(_))
        ));

        let mut c = bare_cli();
        c.api_base = Some("::".to_string());
        assert!(Settings::resolve(&c, FileConfig::default()).is_err());
    }

    #[test]
    fn test_timezone_from_file_and_cli() {
        let file = FileConfig::from_yaml("tz.yaml", "timezone: Europe/Vienna\n").unwrap();
        let settings = Settings::resolve(&bare_cli(), file).unwrap();
        assert_eq!(settings.timezone, chrono_tz::Europe::Vienna);

        let file = FileConfig::from_yaml("tz.yaml", "timezone: Europe/Vienna\n").unwrap();
        let settings = Settings::resolve(&cli(&["--timezone", "UTC"]), file).unwrap();
        assert_eq!(settings.timezone, chrono_tz::UTC);
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let mut c = bare_cli();
        c.timezone = Some("Mars/Olympus".to_string());
        assert!(matches!(
            Settings::resolve(&c, FileConfig::default()),
            Err(ConfigError::InvalidTimezone(name)) if name == "Mars/Olympus"
        ));
    }

    #[test]
    fn test_unknown_yaml_key_rejected() {
        let err = FileConfig::from_yaml("bad.yaml", "api_bse: http://typo/api\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = FileConfig::load("/nonexistent/premium_watch.yaml")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/premium_watch.yaml"));
    }
}
