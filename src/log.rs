use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Rotated daily; older files beyond this count are deleted.
const MAX_LOG_FILES: usize = 3;

const LOG_FILE_PREFIX: &str = "daemon.log";

/// Install the global subscriber: a rotating file layer in the data directory
/// at DEBUG, plus a stderr layer gated by `stderr_filter` (an `EnvFilter`
/// directive such as "warn" or "info").
///
/// The returned guard must stay alive for the process lifetime, or buffered
/// file output is dropped.
pub fn init(data_dir: &Path, stderr_filter: &str) -> Result<WorkerGuard, String> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| format!("Failed to create {}: {}", data_dir.display(), e))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(data_dir)
        .map_err(|e| format!("Failed to open log file in {}: {}", data_dir.display(), e))?;

    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug"));

    let stderr_filter = EnvFilter::try_new(stderr_filter)
        .map_err(|e| format!("Invalid log level '{}': {}", stderr_filter, e))?;
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| format!("Failed to install log subscriber: {}", e))?;

    Ok(guard)
}
