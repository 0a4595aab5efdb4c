//! Error types for the backup engine.
//!
//! `BackupError` represents run-level failures. A run that fails before copying
//! (`InvalidSource`, `DestinationUnavailable`) leaves nothing behind; a `Copy` failure
//! may leave partial output at the target. `LogWrite` is only ever surfaced as a
//! warning on an otherwise successful result.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during a backup run.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Source path is missing or cannot be inspected
    #[error("Invalid backup source: {}", path.display())]
    InvalidSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Destination root does not exist and could not be created
    #[error("Destination unavailable: {}", path.display())]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any I/O failure while duplicating the source, including target name collisions
    #[error("Failed to copy {} to {}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Copied content does not match the source
    #[error("Verification failed for {}: {reason}", path.display())]
    Verification { path: PathBuf, reason: String },

    /// Audit log could not be opened or appended to
    #[error("Failed to write log file: {}", path.display())]
    LogWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Flat classification of a `BackupError`, for callers that only need to branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidSource,
    DestinationUnavailable,
    Copy,
    Verification,
    LogWrite,
}

impl BackupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSource { .. } => ErrorKind::InvalidSource,
            Self::DestinationUnavailable { .. } => ErrorKind::DestinationUnavailable,
            Self::Copy { .. } => ErrorKind::Copy,
            Self::Verification { .. } => ErrorKind::Verification,
            Self::LogWrite { .. } => ErrorKind::LogWrite,
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::InvalidSource { source, .. }
            | Self::DestinationUnavailable { source, .. }
            | Self::Copy { source, .. }
            | Self::LogWrite { source, .. } => source.raw_os_error(),
            Self::Verification { .. } => None,
        }
    }

    pub(crate) fn copy(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Copy {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file does not exist: {}", .0.display())]
    NoFile(PathBuf),

    #[error("Failed to read configuration file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write configuration file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No backup source configured")]
    MissingSource,

    #[error("Interval must be between {min} and {max} minutes, got {minutes}")]
    IntervalOutOfRange { minutes: u32, min: u32, max: u32 },
}
