//! Goro Player (goro-player) - Main entry point
//!
//! Runs the playback engine and ambient controller behind the HTTP control
//! surface. Without a chat-platform voice transport linked in, channels are
//! served by the headless capability: connections are logged and audio is
//! drained to completion.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use goro_common::config::{LoggingConfig, TomlConfig};
use goro_common::events::SignalBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use goro_player::ambient::AmbientController;
use goro_player::api::{self, AppState};
use goro_player::playback::PlaybackEngine;
use goro_player::resolver::SourceResolver;
use goro_player::voice::headless::{HeadlessBackend, LoopbackConnector};

/// Command-line arguments for goro-player
#[derive(Parser, Debug)]
#[command(name = "goro-player")]
#[command(about = "Multi-tenant audio playback orchestrator")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "GORO_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides [api].port)
    #[arg(short, long, env = "GORO_PORT")]
    port: Option<u16>,

    /// Folder with ambient sounds (overrides [ambient].sounds_folder)
    #[arg(long, env = "GORO_SOUNDS_FOLDER")]
    sounds_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(folder) = args.sounds_folder {
        config.ambient.sounds_folder = folder;
    }

    init_tracing(&config.logging)?;

    info!("Starting Goro Player v{}", env!("CARGO_PKG_VERSION"));
    info!("Ambient sounds folder: {}", config.ambient.sounds_folder.display());

    let signals = SignalBus::new();
    let connector = Arc::new(LoopbackConnector);
    let backend = Arc::new(HeadlessBackend);

    // No platform clients are linked into the standalone binary; SoundCloud and
    // YouTube links resolve to ProviderUnavailable and are dropped from queues.
    let resolver = Arc::new(
        SourceResolver::new(config.resolver.clone()).context("Failed to initialize source resolver")?,
    );

    let engine = PlaybackEngine::new(
        resolver.clone(),
        connector.clone(),
        backend.clone(),
        signals.clone(),
    );
    let ambient = AmbientController::new(config.ambient.clone(), connector, backend, signals.clone());
    info!("Playback engine and ambient controller initialized");

    let app = api::create_router(AppState {
        resolver,
        engine: engine.clone(),
        ambient: ambient.clone(),
        signals,
        port: config.api.port,
    });

    let addr: SocketAddr = format!("{}:{}", config.api.bind_addr, config.api.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.api.bind_addr, config.api.port))?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    engine.shutdown().await;
    ambient.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Level priority: RUST_LOG, then `[logging].level`
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
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
