//! Prometheus exporter for srsRAN gNB metrics.
//!
//! The gNB streams JSON metrics over WebSocket on its remote control port.
//! This crate subscribes to that stream, keeps the latest value of every
//! series in memory and serves them on an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  gNB WebSocket  │────>│   Supervisor    │────>│   MetricStore   │
//! │ (remote_control)│     │  + mapping      │     │                 │
//! └─────────────────┘     └─────────────────┘     └────────┬────────┘
//!                                                          │
//!                                                 ┌────────v────────┐
//!                                                 │   HTTP Server   │
//!                                                 │   (/metrics)    │
//!                                                 └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! srsran-exporter --ws-url ws://127.0.0.1:8001 --listen 0.0.0.0:9808
//! ```
//!
//! The gNB must have `remote_control` enabled and `metrics.enable_json`
//! set. See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod declarations;
pub mod http;
pub mod mapping;
pub mod store;
pub mod supervisor;

pub use config::{ConfigError, ExporterConfig, LogFormat, LoggingConfig};
pub use http::HttpServer;
pub use mapping::MessageMapper;
pub use store::{MetricStore, SeriesKey, SharedStore};
pub use supervisor::{ConnectionState, Connector, IngestSupervisor, TcpConnector};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    }
    .map_err(|e| ConfigError::Logging(e.to_string()))
}
