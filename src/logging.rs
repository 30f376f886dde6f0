use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::domain::ASError;

pub const DEFAULT_LOG_FILE: &str = "~/.asearch.log";

pub fn expand_log_path(raw: &str) -> Result<PathBuf, ASError> {
    shellexpand::full(raw)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| ASError::LoggingError(e.to_string()))
}

/// The terminal belongs to the UI, so everything goes to a file. `RUST_LOG` wins over `level`.
pub fn init_logging(path: &Path, level: &str) -> Result<(), ASError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| ASError::LoggingError(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(Arc::new(file)),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| ASError::LoggingError(e.to_string()))?;
    info!("logging initialized, writing to {}", path.display());
    Ok(())
}
