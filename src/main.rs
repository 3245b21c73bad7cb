//! distcache - in-memory TTL cache node
//!
//! Runs a leader, or a follower when a leader address is given.

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use distcache::{Cache, Config, Server};

/// Command line flags. Each one overrides its environment variable.
#[derive(Parser, Debug)]
#[command(name = "distcache", version, about = "In-memory TTL cache with leader/follower replication")]
struct Cli {
    /// Listen address of this node
    #[arg(long = "listenaddr")]
    listen_addr: Option<String>,

    /// Leader to replicate from; omit to run as the leader
    #[arg(long = "leaderaddr")]
    leader_addr: Option<String>,

    /// Snapshot file; omit to disable persistence
    #[arg(long = "storage")]
    storage: Option<std::path::PathBuf>,
}

/// Main entry point for a cache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables, then flags
/// 3. Restore the cache from its snapshot when persistence is enabled
/// 4. Bind and serve until SIGINT/SIGTERM
///
/// Fatal startup or replication errors end the process with a non-zero exit.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "distcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(addr) = cli.listen_addr.filter(|a| !a.is_empty()) {
        config.listen_addr = addr;
    }
    if let Some(addr) = cli.leader_addr.filter(|a| !a.is_empty()) {
        config.leader_addr = Some(addr);
    }
    if let Some(path) = cli.storage.filter(|p| !p.as_os_str().is_empty()) {
        config.storage_path = Some(path);
    }
    info!(
        listen = %config.listen_addr,
        leader = ?config.leader_addr,
        storage = ?config.storage_path,
        "Configuration loaded"
    );

    let cache = match &config.storage_path {
        Some(path) => Cache::open(path)
            .await
            .with_context(|| format!("failed to load snapshot {}", path.display()))?,
        None => Cache::new(),
    };

    let server = Server::bind(config, cache).await?;
    if let Err(err) = server.run_until(shutdown_signal()).await {
        error!(error = %err, "cache node failed");
        return Err(err.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
