//! Configuration for the srsRAN exporter.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use srsran_ws::{DEFAULT_MAX_PAYLOAD, Endpoint};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// gNB WebSocket connection settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Prometheus HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection to the srsRAN remote control server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// WebSocket URL (default: "ws://127.0.0.1:8001").
    #[serde(default = "default_url")]
    pub url: String,

    /// Seconds to wait before reconnecting after a disconnect.
    ///
    /// `0` retries immediately, which against a refusing upstream means a
    /// tight loop of connect attempts and warnings.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: f64,

    /// Seconds allowed for the TCP connect.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: f64,

    /// Largest accepted WebSocket message in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

fn default_url() -> String {
    "ws://127.0.0.1:8001".to_string()
}

fn default_reconnect_delay() -> f64 {
    5.0
}

fn default_connect_timeout() -> f64 {
    10.0
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            reconnect_delay_secs: default_reconnect_delay(),
            connect_timeout_secs: default_connect_timeout(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl UpstreamConfig {
    /// Reconnect delay; out-of-range values fall back to the default.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.reconnect_delay_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_reconnect_delay()))
    }

    /// Connect timeout; out-of-range values fall back to the default.
    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.connect_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_connect_timeout()))
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "127.0.0.1:9808").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "127.0.0.1:9808".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Endpoint::parse(&self.upstream.url)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let delay = self.upstream.reconnect_delay_secs;
        if !delay.is_finite() || delay < 0.0 {
            return Err(ConfigError::Validation(
                "reconnect_delay_secs must be a finite number >= 0".to_string(),
            ));
        }
        Duration::try_from_secs_f64(delay).map_err(|e| {
            ConfigError::Validation(format!("reconnect_delay_secs out of range: {}", e))
        })?;

        let timeout = self.upstream.connect_timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(ConfigError::Validation(
                "connect_timeout_secs must be > 0".to_string(),
            ));
        }
        Duration::try_from_secs_f64(timeout).map_err(|e| {
            ConfigError::Validation(format!("connect_timeout_secs out of range: {}", e))
        })?;

        if self.upstream.max_message_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_message_bytes must be > 0".to_string(),
            ));
        }

        // Validate listen address format
        if self.http.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.http.listen
            )));
        }

        // Validate path starts with /
        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse("{}").unwrap();

        assert_eq!(config.upstream.url, "ws://127.0.0.1:8001");
        assert_eq!(config.upstream.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.upstream.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.upstream.max_message_bytes, 16 * 1024 * 1024);
        assert_eq!(config.http.listen, "127.0.0.1:9808");
        assert_eq!(config.http.path, "/metrics");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            upstream: {
                url: "ws://10.0.0.5:8001/",
                reconnect_delay_secs: 0.5,
                connect_timeout_secs: 2,
                max_message_bytes: 1048576,
            },
            http: {
                listen: "0.0.0.0:9100",
                path: "/srsran/metrics",
            },
            logging: {
                level: "debug",
                format: "json",
            },
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.upstream.url, "ws://10.0.0.5:8001/");
        assert_eq!(config.upstream.reconnect_delay(), Duration::from_millis(500));
        assert_eq!(config.upstream.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.upstream.max_message_bytes, 1_048_576);
        assert_eq!(config.http.listen, "0.0.0.0:9100");
        assert_eq!(config.http.path, "/srsran/metrics");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_invalid_url() {
        let result = ExporterConfig::parse(r#"{ upstream: { url: "wss://gnb:8001" } }"#);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("wss"));
    }

    #[test]
    fn test_validate_negative_delay() {
        let result = ExporterConfig::parse(r#"{ upstream: { reconnect_delay_secs: -1 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_huge_delay() {
        let result = ExporterConfig::parse(r#"{ upstream: { reconnect_delay_secs: 1e300 } }"#);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert!(result.unwrap_err().to_string().contains("reconnect_delay_secs"));
    }

    #[test]
    fn test_validate_huge_connect_timeout() {
        let result = ExporterConfig::parse(r#"{ upstream: { connect_timeout_secs: 1e300 } }"#);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert!(result.unwrap_err().to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_huge_delay_override_does_not_panic() {
        let mut config = ExporterConfig::parse("{}").unwrap();
        config.upstream.reconnect_delay_secs = 1e300;
        assert!(config.validate().is_err());
        assert_eq!(config.upstream.reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_delay_is_immediate_retry() {
        let config = ExporterConfig::parse(r#"{ upstream: { reconnect_delay_secs: 0 } }"#).unwrap();
        assert_eq!(config.upstream.reconnect_delay(), Duration::ZERO);
    }

    #[test]
    fn test_validate_zero_connect_timeout() {
        let result = ExporterConfig::parse(r#"{ upstream: { connect_timeout_secs: 0 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_invalid_listen() {
        let result = ExporterConfig::parse(r#"{ http: { listen: "not-an-address" } }"#);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let result = ExporterConfig::parse(r#"{ http: { path: "no-leading-slash" } }"#);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = ExporterConfig::load_from_file("/nonexistent/srsran-exporter.json5");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
