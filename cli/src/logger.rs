use std::io;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Environment variable holding `tracing` filter directives.
pub const LOG_ENV: &str = "LZBACKUP_LOG";

/// Install the global diagnostics subscriber, writing to stderr.
///
/// `LZBACKUP_LOG` overrides the default level (`info`, or `debug` with `verbose`).
pub fn init_logger(verbose: bool) -> Result<(), LoggerError> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::new(if verbose { "debug" } else { "info" }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(LoggerError::Install)
}

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid LZBACKUP_LOG filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to install logger: {0}")]
    Install(Box<dyn std::error::Error + Send + Sync>),
}
