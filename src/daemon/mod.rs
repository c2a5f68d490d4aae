// Server bootstrap: config resolution, data directory, logging and the
// foreground serve loop.

pub mod events;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing_appender::non_blocking::WorkerGuard;

use crate::daemon::events::BoardEvent;
use crate::models::BoardConfig;
use crate::scraper::{ActuaryListSource, ControllerSettings, JobSource, ScrapeController};
use crate::server::{self, AppState};
use crate::storage::jobs::JsonJobStore;
use crate::storage::JobStore;

const APP_DIR_NAME: &str = "actuary-job-board";

/// How long an in-flight scrape gets to reach a checkpoint on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

fn read_config_file(path: &Path, origin: &str) -> Result<BoardConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", origin))?;
    let config: BoardConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", origin))?;
    tracing::info!("Loaded config from: {}", path.display());
    Ok(config)
}

/// Load the BoardConfig. Resolution order:
///   1. `--config` path (must exist)
///   2. `AJB_CONFIG_DIR/config.json`
///   3. Platform config dir (`dirs::config_dir()/actuary-job-board/config.json`)
///   4. `{data_dir}/config.json`
///   5. `BoardConfig::default()`
pub fn load_config(config_path: Option<&Path>) -> Result<BoardConfig> {
    if let Some(path) = config_path {
        if path.exists() {
            return read_config_file(path, "config file");
        }
        return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
    }

    if let Ok(config_dir) = std::env::var("AJB_CONFIG_DIR") {
        let path = PathBuf::from(&config_dir).join("config.json");
        if path.exists() {
            return read_config_file(&path, "AJB_CONFIG_DIR");
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join(APP_DIR_NAME).join("config.json");
        if path.exists() {
            return read_config_file(&path, "platform config dir");
        }
    }

    let path = resolve_data_dir(None).join("config.json");
    if path.exists() {
        return read_config_file(&path, "data dir");
    }

    tracing::info!("No config file found, using defaults");
    Ok(BoardConfig::default())
}

/// Resolve the data directory: explicit override, then `AJB_DATA_DIR`, then
/// the platform data dir (`~/.local/share/actuary-job-board` on Linux).
pub fn resolve_data_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }

    if let Ok(d) = std::env::var("AJB_DATA_DIR") {
        return PathBuf::from(d);
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub async fn create_data_dirs(data_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .context("Failed to create data directory")?;
    tracing::info!("Data directory ensured at: {}", data_dir.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install the stderr + `board.log` subscriber.
///
/// Returns the appender guard, which must outlive the server so buffered
/// lines get flushed. Returns `None` when a subscriber is already installed
/// (e.g. `--verbose`) or the log file cannot be opened.
pub fn init_tracing(data_dir: &Path) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = data_dir.join("board.log");
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .try_init();
            tracing::warn!("Cannot open {} ({}), logging to stderr only", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        Ok(()) => {
            tracing::info!("Logging to stderr and {}", log_path.display());
            Some(guard)
        }
        Err(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Wire the store, source, controller and event channel into an `AppState`.
///
/// `config.data_dir` must already be resolved.
pub async fn build_state(config: BoardConfig) -> Result<Arc<AppState>> {
    let data_dir = config
        .data_dir
        .clone()
        .context("Data directory was not resolved")?;

    let job_store =
        Arc::new(JsonJobStore::new(data_dir).await?) as Arc<dyn JobStore>;
    let source = Arc::new(
        ActuaryListSource::new(&config).context("Failed to build the ActuaryList source")?,
    ) as Arc<dyn JobSource>;
    let (event_tx, _event_rx) = broadcast::channel::<BoardEvent>(config.broadcast_capacity);
    let controller = Arc::new(
        ScrapeController::new(source, Arc::clone(&job_store), ControllerSettings::from(&config))
            .with_events(event_tx.clone()),
    );

    Ok(Arc::new(AppState {
        job_store,
        controller,
        event_tx,
        config: Arc::new(config),
        start_time: Instant::now(),
    }))
}

/// Run the HTTP server in the foreground until Ctrl+C or SIGTERM.
pub async fn run_server(
    config_path: Option<&Path>,
    data_dir_override: Option<&Path>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path)?;

    if let Some(p) = port_override {
        config.port = p;
    }

    let data_dir = if let Some(d) = data_dir_override {
        d.to_path_buf()
    } else if let Some(ref d) = config.data_dir {
        d.clone()
    } else {
        resolve_data_dir(None)
    };
    config.data_dir = Some(data_dir.clone());

    create_data_dirs(&data_dir).await?;
    let _log_guard = init_tracing(&data_dir);
    tracing::info!("Data directory: {}", data_dir.display());

    let state = build_state(config).await?;
    let controller = Arc::clone(&state.controller);

    let router = server::create_router(Arc::clone(&state));
    let bind_addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    tracing::info!("Job board listening on http://{}", bind_addr);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(());
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
                tracing::info!("HTTP server received shutdown signal");
            })
            .await
        {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    wait_for_signal().await?;

    // Let an in-flight scrape publish its terminal snapshot before the
    // server goes away.
    controller.shutdown(SHUTDOWN_GRACE).await;

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    tracing::info!("Job board exited cleanly.");
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C signal");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM signal");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        tracing::info!("Received Ctrl+C signal");
    }
    Ok(())
}
