//! Core data model for backup runs.
//!
//! This module defines the values that flow through a single run:
//! - BackupRequest: what to back up, where, and how
//! - BackupResult: what a successful run produced
//! - BackupMode, RunState: enums describing a run

use std::fmt;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::BackupError;

/// How a run was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    /// Triggered by the user
    Manual,
    /// Triggered by the scheduler
    Automatic,
}

impl BackupMode {
    /// Label written to the audit log.
    pub fn log_label(&self) -> &'static str {
        match self {
            BackupMode::Manual => "手动保存",
            BackupMode::Automatic => "自动保存",
        }
    }

    pub fn is_automatic(&self) -> bool {
        matches!(self, BackupMode::Automatic)
    }
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupMode::Manual => write!(f, "manual"),
            BackupMode::Automatic => write!(f, "automatic"),
        }
    }
}

/// A single backup invocation. Built fresh by the caller for every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    source: PathBuf,
    destination_root: PathBuf,
    overwrite: bool,
    mode: BackupMode,
}

impl BackupRequest {
    pub fn new<S, D>(source: S, destination_root: D, overwrite: bool, mode: BackupMode) -> Self
    where
        S: Into<PathBuf>,
        D: Into<PathBuf>,
    {
        BackupRequest {
            source: source.into(),
            destination_root: destination_root.into(),
            overwrite,
            mode,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn mode(&self) -> BackupMode {
        self.mode
    }
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct BackupResult {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Path the source was copied to
    pub target_path: PathBuf,

    /// Total size of the copied output in bytes
    pub size_bytes: u64,

    /// When the run finished copying and measuring
    pub timestamp: DateTime<Local>,

    /// How the run was triggered
    pub mode: BackupMode,

    /// Set when the copy succeeded but the audit log could not be written
    pub log_warning: Option<BackupError>,
}

impl BackupResult {
    /// Human-readable size of the copied output.
    pub fn size_display(&self) -> String {
        crate::size::format_size(self.size_bytes)
    }
}

/// The stage a run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Checking the source and preparing the destination root
    Validating,
    Copying,
    /// Comparing checksums of source and copy (only when configured)
    Verifying,
    Measuring,
    Logging,
    Done,
    Failed,
}

impl RunState {
    /// Returns true if no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Validating => "validating",
            RunState::Copying => "copying",
            RunState::Verifying => "verifying",
            RunState::Measuring => "measuring",
            RunState::Logging => "logging",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_labels() {
        assert_eq!(BackupMode::Manual.log_label(), "手动保存");
        assert_eq!(BackupMode::Automatic.log_label(), "自动保存");
        assert!(BackupMode::Automatic.is_automatic());
        assert!(!BackupMode::Manual.is_automatic());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Copying.is_terminal());
        assert!(!RunState::Idle.is_terminal());
    }
}
