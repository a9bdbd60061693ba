//! cardgraph - livestream card sales back office
//!
//! Records scheduled auction livestreams, transcribes them with Whisper,
//! parses the transcripts into card records and reconciles PayPal and eBay
//! payments.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cg_common::config::{load_toml_config, LoggingConfig, RootFolderInitializer, RootFolderResolver};
use cg_common::db::settings::{get_setting_i64, SCHEDULER_INTERVAL_SETTING};
use cg_server::config::{resolve_scheduler_key, ServerConfig};
use cg_server::services::scheduler::{run_scheduler_loop, DEFAULT_TICK_INTERVAL};
use cg_server::services::SessionRuntime;
use cg_server::AppState;

const MODULE_NAME: &str = "cardgraph";

/// Command-line arguments for cardgraph
#[derive(Parser, Debug)]
#[command(name = "cardgraph")]
#[command(about = "Livestream card sales back office")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "CARDGRAPH_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter (overrides RUST_LOG and the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Do not run the in-process scheduler loop
    #[arg(long)]
    no_scheduler: bool,
}

/// Install the tracing subscriber
///
/// Filter priority: `--log-level` → `RUST_LOG` → `[logging] level`. When
/// `[logging] file` is set, events are also appended to that file.
fn init_tracing(cli_level: Option<&str>, logging: &LoggingConfig) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level).context("Invalid --log-level")?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&logging.level))
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };

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

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_toml_config(MODULE_NAME);
    init_tracing(args.log_level.as_deref(), &toml_config.logging)?;

    info!("Starting cardgraph");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Step 1: Resolve root folder
    let resolver = RootFolderResolver::new(MODULE_NAME).with_cli_arg(args.root_folder.clone());
    let root_folder = resolver.resolve();

    // Step 2: Create root folder directory if missing
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = cg_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let scheduler_key = resolve_scheduler_key(&pool, &toml_config).await?;
    let runtime = SessionRuntime::new(pool.clone(), toml_config.tools.clone());
    let state = AppState::new(runtime.clone(), scheduler_key);
    let app = cg_server::build_router(state);

    let shutdown = CancellationToken::new();
    let scheduler = if args.no_scheduler {
        info!("In-process scheduler disabled");
        None
    } else {
        let default_secs = DEFAULT_TICK_INTERVAL.as_secs() as i64;
        let secs = get_setting_i64(&pool, SCHEDULER_INTERVAL_SETTING, default_secs)
            .await
            .unwrap_or(default_secs);
        let interval = Duration::from_secs(secs.max(1) as u64);
        Some(tokio::spawn(run_scheduler_loop(runtime.clone(), interval, shutdown.clone())))
    };

    let server = ServerConfig::resolve(args.bind, args.port, &toml_config);
    let address = server.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("Listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
    runtime.registry.cancel_all().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
