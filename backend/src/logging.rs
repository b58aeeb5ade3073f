//! Logging setup.
//!
//! Console output is always on; a daily-rotated log file is added when
//! `logging.log_file` is configured.

use crate::config::LoggingConfig;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const DEFAULT_LEVEL: &str = "info";

/// Build the filter: `RUST_LOG` wins, then the configured level, then `info`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(config.log_level.as_deref().unwrap_or(DEFAULT_LEVEL))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
    })
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer; keep it alive for the
/// lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_timer(UtcTime::new(Rfc3339))
        .compact()
        .boxed();

    let (file_layer, guard) = match config.log_file.as_deref() {
        Some(path) => match file_writer(path) {
            Ok((writer, guard)) => {
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_timer(UtcTime::new(Rfc3339))
                    .with_target(true)
                    .with_ansi(false)
                    .boxed();
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("Warning: Failed to open log file {:?}: {}", path, e);
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = &config.log_file {
        tracing::info!("Logging to file {:?} (rotated daily)", path);
    }

    guard
}

fn file_writer(
    path: &Path,
) -> std::io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "thais-mcp.log".into());

    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
