//! Prometheus exporter for srsRAN gNB metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use srsran_exporter::declarations::{
    WS_CONNECTIONS_TOTAL, WS_MESSAGES_TOTAL, WS_PARSE_ERRORS_TOTAL,
};
use srsran_exporter::{
    ExporterConfig, HttpServer, IngestSupervisor, MetricStore, TcpConnector, init_tracing,
};

/// Expose srsRAN gNB JSON metrics as Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "srsran-exporter")]
#[command(about = "Expose srsRAN gNB JSON metrics as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// WebSocket URL of the srsRAN remote control server (overrides config).
    #[arg(long)]
    ws_url: Option<String>,

    /// Seconds to wait before reconnecting (overrides config).
    #[arg(long)]
    reconnect_delay: Option<f64>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // CLI overrides
    if let Some(url) = args.ws_url {
        config.upstream.url = url;
    }
    if let Some(delay) = args.reconnect_delay {
        config.upstream.reconnect_delay_secs = delay;
    }
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        upstream = %config.upstream.url,
        listen = %config.http.listen,
        "Starting srsRAN exporter"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let store = Arc::new(MetricStore::new());

    let listen_addr: SocketAddr = config
        .http
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Create components
    let connector = TcpConnector::new(&config.upstream.url, config.upstream.connect_timeout())?;
    let supervisor = IngestSupervisor::new(
        connector,
        store.clone(),
        config.upstream.reconnect_delay(),
    )
    .with_max_message_bytes(config.upstream.max_message_bytes);
    let http_server = HttpServer::new(store.clone(), listen_addr, config.http.path.clone());

    // Start ingestion
    let supervisor_task = tokio::spawn(supervisor.run(shutdown_rx.clone()));

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = supervisor_task.await;
        let _ = http_task.await;
    })
    .await;

    info!(
        messages = store.get(WS_MESSAGES_TOTAL, &[]).unwrap_or_default(),
        parse_errors = store.get(WS_PARSE_ERRORS_TOTAL, &[]).unwrap_or_default(),
        connections = store.get(WS_CONNECTIONS_TOTAL, &[]).unwrap_or_default(),
        series_count = store.series_count(),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
