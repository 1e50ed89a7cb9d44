//! Contest gateway
//!
//! Loads configuration, wires storage, optionally seeds the catalog and
//! serves the REST API until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{error, info, warn};

use contest_gateway::{
    create_routes, initialize_logging, load_config, seed, setup_signal_handlers, AppState,
};

#[derive(Debug, Parser)]
#[command(name = "contest-gateway", version, about = "Contest entry and wallet REST service")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides server.bind
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// JSON catalog to load before serving
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Ignore database.url and keep everything in memory
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    initialize_logging(&config.logging)?;
    info!("Starting Contest Gateway v{}", env!("CARGO_PKG_VERSION"));

    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.metrics.port)))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exported on port {}", config.metrics.port);
    }

    let state = Arc::new(AppState::new(&config, args.in_memory).await?);
    info!("Service state initialized");

    if let Some(path) = &args.seed {
        let file = seed::read_seed_file(path)?;
        seed::apply_seed(&state, file).await?;
    }

    let shutdown_signal = setup_signal_handlers()?;
    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let (addr, server) = warp::serve(create_routes(state))
        .try_bind_with_graceful_shutdown(config.server.bind, async move {
            let _ = shutdown_signal.await;
            let _ = drain_tx.send(());
        })
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    info!("Contest Gateway listening on {}. Press Ctrl+C to shutdown gracefully.", addr);
    let mut server = tokio::spawn(server);

    tokio::select! {
        result = &mut server => {
            if let Err(e) = result {
                error!("Server task failed: {}", e);
            }
            return Ok(());
        }
        _ = drain_rx => {}
    }

    info!("Shutdown signal received, draining open requests...");
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    match timeout(shutdown_timeout, server).await {
        Ok(Ok(())) => info!("Contest Gateway stopped gracefully"),
        Ok(Err(e)) => error!("Server task failed: {}", e),
        Err(_) => warn!("Requests still open after {:?}, forcing shutdown", shutdown_timeout),
    }

    Ok(())
}
