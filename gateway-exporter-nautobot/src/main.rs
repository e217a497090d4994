//! Nautobot inventory exporter for gNMI interface telemetry.

use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use gateway_common::{CacheHandle, Notification, decode_many, init_tracing};
use gateway_exporter_nautobot::{Exporter, ExporterConfig, NautobotClient, NautobotExporter};

/// Synchronize gNMI interface status into Nautobot.
#[derive(Parser, Debug)]
#[command(name = "gateway-exporter-nautobot")]
#[command(about = "Synchronize gNMI interface status telemetry into Nautobot")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Replay notifications from a file ("-" for stdin): JSON lines, a JSON
    /// array, or a single CBOR document.
    #[arg(long)]
    replay: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides the config.
    #[arg(long)]
    log_level: Option<String>,
}

fn read_replay(source: &str) -> anyhow::Result<Vec<Notification>> {
    let data = if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(source)?
    };
    Ok(decode_many(&data)?)
}

async fn shutdown_signal() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|_| "Ctrl+C").map_err(Into::into),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
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
    config.logging = config.logging.with_level_override(args.log_level);

    init_tracing(&config.logging)?;

    info!("Starting gNMI gateway Nautobot exporter");

    let client = Arc::new(NautobotClient::from_env(&config.inventory));
    if client.base_url().is_empty() {
        warn!(
            env = %config.inventory.url_env,
            "Inventory base URL is not set, requests will fail"
        );
    }

    let mut exporter = NautobotExporter::new(config, client);

    // The notification cache is owned by the upstream gateway.
    let cache: CacheHandle = Arc::new(());
    exporter.start(cache).await?;

    if let Some(source) = &args.replay {
        let notifications = read_replay(source)?;
        info!(count = notifications.len(), source = %source, "Replaying notifications");
        for notification in &notifications {
            exporter.export(notification).await;
        }
    }

    let signal = shutdown_signal().await?;
    info!("Received {}, shutting down...", signal);

    let stats = exporter.collector().stats();
    info!(
        updates_received = stats.updates_received,
        sync_succeeded = stats.sync_succeeded,
        sync_failed = stats.sync_failed,
        interfaces_created = stats.interfaces_created,
        interfaces_tracked = stats.interfaces_tracked,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}
