//! Tierpix API server - tiered image derivatives and temporary links.
//!
//! Serves the authenticated `/api/v0` surface, the public `/gw/:slug`
//! temporary-link route, and `/_status` health checks. A background task
//! periodically sweeps expired links nobody ever read.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use service::{Config, ServiceState};

/// Tierpix API server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for HTTP requests
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Data directory (SQLite database + stored files). When omitted the
    /// server runs fully in memory.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Interval in seconds between expired-link sweeps. 0 disables the
    /// sweep task; expired links are still removed lazily on read.
    #[arg(long, default_value = "600")]
    sweep_interval: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!("Starting tierpix gateway");

    let config = Config {
        log_level,
        data_dir: args.data_dir,
        api_listen_addr: Some(SocketAddr::from_str(&format!("0.0.0.0:{}", args.port))?),
        link_sweep_interval: match args.sweep_interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
    };

    let state = match ServiceState::from_config(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create service state: {}", e);
            std::process::exit(1);
        }
    };

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let graceful_shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl+c: {}", e);
            return;
        }
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    };
    tokio::spawn(graceful_shutdown);

    // Background sweep for expired links that are never read
    if let Some(interval) = config.link_sweep_interval {
        let links = state.links().clone();
        let mut sweep_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match links.sweep().await {
                            Ok(removed) if removed > 0 => {
                                tracing::info!(removed, "swept expired links");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!("link sweep failed: {}", e),
                        }
                    }
                    _ = sweep_rx.changed() => break,
                }
            }
        });
    }

    let listen_addr = config
        .api_listen_addr
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));
    let router = service::http::router(state);

    tracing::info!("Listening on {}", listen_addr);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    let mut server_rx = shutdown_rx.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = server_rx.changed().await;
        })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
