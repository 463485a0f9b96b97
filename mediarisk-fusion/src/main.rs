//! mediarisk-fusion - media risk fusion service
//!
//! Fuses detector signals into one risk decision per request and runs
//! liveness checks, over HTTP.
//!
//! Startup:
//! 1. Parse CLI arguments
//! 2. Load TOML config (CLI → MEDIARISK_CONFIG → ~/.config/mediarisk → defaults)
//! 3. Initialize tracing
//! 4. Validate weight tables
//! 5. Open the decision database, if configured
//! 6. Serve until Ctrl+C / SIGTERM

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mediarisk_common::config::{load_toml_config, resolve_config_path, LoggingConfig};
use mediarisk_fusion::db::{self, DecisionSink, SqliteDecisionStore};
use mediarisk_fusion::fusion::WeightTables;
use mediarisk_fusion::AppState;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for mediarisk-fusion
#[derive(Parser, Debug)]
#[command(name = "mediarisk-fusion")]
#[command(about = "Multi-detector media risk fusion service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "MEDIARISK_PORT")]
    port: Option<u16>,

    /// SQLite database for decision records (overrides config)
    #[arg(short, long, env = "MEDIARISK_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = load_toml_config(config_path.as_deref()).context("Failed to load config")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }

    init_tracing(&config.logging)?;

    info!("Starting mediarisk-fusion v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: compiled defaults"),
    }

    let weights = WeightTables::from_config(&config.weights).context("Invalid weight tables")?;
    for kind in mediarisk_fusion::fusion::PipelineKind::ALL {
        let table = weights.get(kind);
        info!(pipeline = %kind, modalities = table.len(), "Weight table loaded");
    }

    let sink: Option<Arc<dyn DecisionSink>> = match &config.database_path {
        Some(path) => {
            let pool = db::init_database_pool(path)
                .await
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            info!("Database: {}", path.display());
            Some(Arc::new(SqliteDecisionStore::new(pool)))
        }
        None => {
            info!("No database configured, decisions are not persisted");
            None
        }
    };

    let state = AppState::new(
        weights,
        sink,
        Duration::from_millis(config.detector_timeout_ms),
    );
    let app = mediarisk_fusion::build_router(state);

    let ip = config
        .bind_address
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid bind address '{}'", config.bind_address))?;
    let addr = SocketAddr::new(ip, config.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr, and also to
/// `logging.file` when set.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mediarisk_fusion={level},mediarisk_common={level},tower_http={level}",
            level = logging.level
        ))
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install signal handler");
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
