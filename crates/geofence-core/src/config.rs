//! Configuration management for geofence

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix for environment overrides, e.g. `GEOFENCE__WEBHOOK__PARALLEL=false`
const ENV_PREFIX: &str = "GEOFENCE";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Webhook delivery configuration
    pub webhook: WebhookConfig,

    /// Region monitoring configuration
    pub monitoring: MonitoringConfig,

    /// Broadcast channel configuration
    pub broadcast: BroadcastConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file, overlaid with `GEOFENCE__*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

/// Webhook delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Time allowed to establish the connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Time allowed for the response once connected
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Deliver all webhooks of one event concurrently
    pub parallel: bool,
}

impl WebhookConfig {
    /// Worst-case duration of a single delivery
    pub fn total_timeout(&self) -> Duration {
        self.connect_timeout + self.read_timeout
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(10),
            parallel: true,
        }
    }
}

/// Region monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Dwell time used when a fence registers a loitering delay of zero
    #[serde(with = "humantime_serde")]
    pub default_loitering_delay: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            default_loitering_delay: Duration::from_secs(60 * 60),
        }
    }
}

/// Broadcast channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Messages retained for slow subscribers before they lag
    pub channel_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.webhook.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.webhook.read_timeout, Duration::from_secs(10));
        assert_eq!(config.webhook.total_timeout(), Duration::from_secs(25));
        assert_eq!(
            config.monitoring.default_loitering_delay,
            Duration::from_millis(3_600_000)
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[webhook]\nconnect_timeout = \"2s\"\nparallel = false\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.webhook.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.webhook.read_timeout, Duration::from_secs(10));
        assert!(!config.webhook.parallel);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/geofence.toml")));
        assert!(result.is_err());
    }
}
