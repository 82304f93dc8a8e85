//! Tap catalog admin API server.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────┐
//!                 │                   tap-admin                       │
//!   Client        │  ┌─────────┐   ┌───────────────┐   ┌───────────┐  │
//!   ─────────────▶│  │  http   │──▶│     gates     │──▶│ handlers  │  │
//!                 │  │ server  │   │ rate limit,   │   │ accounts, │  │
//!                 │  └─────────┘   │ token, role   │   │ catalog   │  │
//!                 │                └───────┬───────┘   └─────┬─────┘  │
//!                 │                        ▼                 ▼        │
//!                 │                ┌─────────────┐   ┌─────────────┐  │
//!                 │                │    store    │   │    media    │  │
//!                 │                │   (redis)   │   │  (objects)  │  │
//!                 │                └─────────────┘   └─────────────┘  │
//!                 │  config (hot reload) · observability · lifecycle  │
//!                 └───────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

use tap_admin::config::{load_or_default, ConfigWatcher, CONFIG_PATH_ENV};
use tap_admin::lifecycle::{
    bootstrap_super_admin, connect_media, connect_store, wait_for_signal, Shutdown, StartupError,
};
use tap_admin::net::load_tls_config;
use tap_admin::observability::{logging, metrics};
use tap_admin::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "tap-admin", version, about = "Tap catalog admin API")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref()).map_err(StartupError::from)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tap-admin starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        store = ?config.store.backend,
        storage = ?config.storage.backend,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = connect_store(&config.store).await?;
    let media = connect_media(&config.storage)?;
    let server = HttpServer::new(config.clone(), store, media).map_err(StartupError::from)?;
    bootstrap_super_admin(&config.auth, &server.state().accounts).await?;

    // Keep the watcher alive for the whole run
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    (updates, None)
                }
            }
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let shutdown = Shutdown::new();
    let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);

    let server_task = match &config.listener.tls {
        Some(tls) => {
            let tls_config = load_tls_config(tls).await.map_err(StartupError::Tls)?;
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            tokio::spawn(server.run_tls(addr, tls_config, config_updates, shutdown.subscribe()))
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address)
                .await
                .map_err(StartupError::from)?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()))
        }
    };

    tokio::pin!(server_task);
    tokio::select! {
        result = &mut server_task => {
            result??;
            return Ok(());
        }
        _ = wait_for_signal() => {}
    }

    if !shutdown.drain(&mut server_task, grace).await {
        tracing::warn!("Forcing exit with connections still open");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
