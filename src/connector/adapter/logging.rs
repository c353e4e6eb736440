use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::EnvFilter;

/// Initializes the process-wide tracing subscriber: JSON-formatted logs
/// rotated hourly under `{data_dir}/logs/{service}/` (spec §6.1), with a
/// `RUST_LOG`-overridable filter defaulting to `default_level`. Returns the
/// `WorkerGuard` the caller must keep alive for the life of the process —
/// dropping it flushes the non-blocking writer's background thread.
pub fn init_tracing(data_dir: &Path, service: &str, default_level: &str) -> std::io::Result<WorkerGuard> {
    let log_dir = data_dir.join("logs").join(service);
    std::fs::create_dir_all(&log_dir)?;

    let appender = Builder::new()
        .rotation(Rotation::HOURLY)
        .filename_prefix(service)
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("failed to build rolling log appender: {}", e)))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .json()
        .init();

    Ok(guard)
}
