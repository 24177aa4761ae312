//! Logging initialization for multiship.
//!
//! With `logging.to_file`: logs to `<state>/logs/multiship-{datetime}.log`
//! Otherwise: logs to stderr

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Keeps the file writer alive; dropping it flushes buffered lines
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,
    /// Set only when logging to a file
    pub log_file_path: Option<PathBuf>,
}

/// Log file name for a run started now
pub fn log_file_name() -> String {
    format!("multiship-{}.log", chrono::Utc::now().format("%Y%m%dT%H%M%SZ"))
}

/// Filter directive: `--debug` beats the configured level, `RUST_LOG` beats both
fn filter_directive(config: &Config, debug_override: bool) -> String {
    if let Ok(directive) = std::env::var("RUST_LOG") {
        return directive;
    }
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

/// Install the global subscriber
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let filter = EnvFilter::try_new(filter_directive(config, debug_override))
        .context("Invalid log filter")?;

    let (writer, handle, ansi) = if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create {}", logs_dir.display()))?;

        let file_name = log_file_name();
        let appender = tracing_appender::rolling::never(&logs_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let handle = LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(logs_dir.join(file_name)),
        };
        (BoxMakeWriter::new(non_blocking), handle, false)
    } else {
        let handle = LoggingHandle {
            _guard: None,
            log_file_path: None,
        };
        (BoxMakeWriter::new(std::io::stderr), handle, true)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(writer),
        )
        .init();

    Ok(handle)
}
