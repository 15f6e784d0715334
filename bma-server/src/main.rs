//! bma-server - music catalog and pairing server
//!
//! Scans a music folder, then serves the catalog and audio to paired mobile
//! clients over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bma_common::api::PairingResponse;
use bma_common::config::{load_config, CliOverrides, ServerSettings};
use bma_server::library::LibraryEngine;
use bma_server::trust::{spawn_reaper, TrustLayer};
use bma_server::{advertised_server_url, build_router, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for bma-server
#[derive(Parser, Debug)]
#[command(name = "bma-server")]
#[command(about = "Music catalog and streaming server for paired mobile clients")]
#[command(version)]
struct Args {
    /// Music folder to scan (overrides BMA_MUSIC_FOLDER and config file)
    #[arg(short, long)]
    music_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "BMA_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "BMA_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Base URL advertised to clients during pairing
    #[arg(long, env = "BMA_SERVER_URL")]
    server_url: Option<String>,

    /// Config file (default: ~/.config/bma/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_config(args.config.as_deref()).context("Failed to load config")?;
    let settings = ServerSettings::resolve(
        CliOverrides {
            music_folder: args.music_folder,
            port: args.port,
            bind_address: args.bind_address,
            server_url: args.server_url,
        },
        &toml_config,
    )
    .context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting BMA Server (bma-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let library = Arc::new(LibraryEngine::new());
    let trust = Arc::new(TrustLayer::new(settings.device_inactivity));

    match &settings.music_folder {
        Some(folder) => {
            // Scan result is logged by the engine
            let _scan = library.select_root(folder.clone());
        }
        None => warn!("No music folder configured; serving an empty library"),
    }

    let server_url = advertised_server_url(settings.server_url.as_deref(), settings.port);
    info!("Advertising server URL {}", server_url);

    // Startup pairing token so a client can pair straight from the log
    let issued = trust.issue_token(settings.pairing_ttl_minutes);
    let pairing = PairingResponse {
        server_url: server_url.clone(),
        token: issued.token,
        expires_at: issued.expires_at,
    };
    match serde_json::to_string(&pairing) {
        Ok(json) => info!("Pairing data: {}", json),
        Err(e) => error!("Failed to encode pairing data: {}", e),
    }

    let reaper = spawn_reaper(Arc::clone(&trust), settings.reap_interval);

    let state = AppState::new(
        Arc::clone(&library),
        Arc::clone(&trust),
        server_url,
        settings.port,
        settings.pairing_ttl_minutes,
    );
    let app = build_router(state);

    let addr = SocketAddr::new(settings.bind_address, settings.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("bma-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    reaper.abort();
    trust.reset();

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
