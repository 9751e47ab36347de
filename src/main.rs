//! Endpoint Health Monitor Binary

use clap::Parser;
use endpoint_monitor::{Config, Monitor, MonitorError, Result, config};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "endpoint_monitor", version, about = "HTTP endpoint health monitor")]
struct Args {
    /// Path to a JSON file with the monitored endpoint list
    #[arg(long, env = "ENDPOINTS_FILE")]
    endpoints_file: Option<PathBuf>,

    /// Seconds between sweeps
    #[arg(long)]
    interval: Option<u64>,

    /// Run a single sweep, print the results, and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    info!("Starting Endpoint Health Monitor v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = Config::from_env();

    if let Some(path) = &args.endpoints_file {
        config.endpoints = config::load_endpoints_file(path)?;
    }

    if let Some(seconds) = args.interval {
        config.check_interval = Duration::from_secs(seconds);
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!(
        "Monitoring {} endpoints every {:?}, alert threshold {}",
        config.endpoints.len(),
        config.check_interval,
        config.alert_threshold
    );

    let monitor = Monitor::new(config)?;

    if args.once {
        let statuses = monitor.run_sweep().await?;
        for status in &statuses {
            info!(
                "{}: {} (code {:?}, {:?}ms, uptime {:?}%)",
                status.name,
                status.state,
                status.status_code,
                status.response_time_ms,
                status.uptime_percentage
            );
        }
        return Ok(());
    }

    let monitor = Arc::new(monitor);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move { monitor.run(shutdown_rx).await })
    };

    tokio::signal::ctrl_c().await.map_err(|e| {
        MonitorError::Other(format!("Failed to wait for shutdown signal: {}", e))
    })?;

    info!("Shutting down endpoint monitor");
    let _ = shutdown_tx.send(true);
    let _ = runner.await;

    Ok(())
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
