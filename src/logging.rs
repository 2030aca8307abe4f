//! Tracing bootstrap.
//!
//! `RUST_LOG` takes precedence over the configured level. When a log
//! directory is configured, events are also written to a daily rolling file
//! through a non-blocking writer; keep the returned guard alive until exit so
//! buffered lines are flushed.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "house-sync.log";

pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log level `{}`", config.level))?,
    };

    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(directory) = &config.directory else {
        // Already initialized by an embedding application or an earlier call.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stderr)
            .try_init();
        return Ok(None);
    };

    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create log directory `{}`", directory.display()))?;

    let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer().with_writer(writer).with_ansi(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init();

    Ok(Some(guard))
}
