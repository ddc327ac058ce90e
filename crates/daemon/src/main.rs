//! Vigil Health Daemon - Main Entry Point
//! Loads settings, wires probes and publishers, runs the scheduler until Ctrl+C

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil_core::application::{HealthExecutor, HealthScheduler};
use vigil_core::port::Publisher;
use vigil_infra_system::{Catalog, LogPublisher, Settings};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FORMAT_ENV: &str = "VIGIL_LOG_FORMAT";
const LOG_DIR_ENV: &str = "VIGIL_LOG_DIR";
const LOG_FILE_PREFIX: &str = "vigil.log";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Console logging plus an optional daily-rolling JSON file
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the whole process.
fn init_tracing() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("vigil=info"))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);

    match log_format.as_str() {
        // Production: JSON structured logging
        "json" => registry.with(fmt::layer().json()).init(),
        // Development: pretty formatting with colors
        _ => registry.with(fmt::layer().pretty()).init(),
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    let _log_guard = init_tracing()?;
    info!("Vigil health daemon v{} starting...", VERSION);

    // 2. Settings
    let settings = Settings::load(None).context("Failed to load settings")?;
    let scheduler_config = settings
        .scheduler
        .to_config()
        .context("Invalid scheduler settings")?;

    // 3. Probes and publishers (DI wiring)
    let catalog = Catalog::new();
    let registry = catalog
        .build_registry(&settings.probes)
        .context("Failed to build probe registry")?;
    if registry.is_empty() {
        warn!("No probes configured; every report will be empty and healthy");
    }

    let mut publishers = catalog
        .build_publishers(&settings.publishers)
        .context("Failed to build publishers")?;
    if publishers.is_empty() {
        info!("No publishers configured, defaulting to log publisher");
        publishers.push(Arc::new(LogPublisher::default()) as Arc<dyn Publisher>);
    }

    // 4. Scheduler
    let scheduler = HealthScheduler::new(
        Arc::new(HealthExecutor::default()),
        Arc::new(registry),
        publishers,
        scheduler_config,
    )
    .context("Failed to create scheduler")?;
    let mut handle = scheduler.start();

    info!("System ready. Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.stop()).await.is_err() {
        warn!(
            timeout_ms = SHUTDOWN_TIMEOUT.as_millis() as u64,
            "Scheduler did not stop in time, exiting anyway"
        );
    }

    info!(cycles = handle.cycles_completed(), "Shutdown complete.");
    Ok(())
}
