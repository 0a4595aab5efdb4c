//! Backup run orchestration.
//!
//! A run moves through `Validating → Copying → [Verifying] → Measuring → Logging → Done`,
//! or to `Failed` from any non-terminal state. The engine keeps no state between runs;
//! the audit log file is the only thing runs share.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::audit::{AuditLog, LogEntry};
use crate::error::BackupError;
use crate::fs_ops;
use crate::model::{BackupRequest, BackupResult, RunState};
use crate::naming;
use crate::progress::ProgressCallback;
use crate::size;
use crate::verify::{self, ChecksumAlgorithm};

/// Executes backup runs and records them in an audit log.
#[derive(Debug, Clone)]
pub struct BackupEngine {
    audit_log: AuditLog,
    verify: Option<ChecksumAlgorithm>,
}

impl BackupEngine {
    pub fn new(audit_log: AuditLog) -> Self {
        BackupEngine {
            audit_log,
            verify: None,
        }
    }

    /// Compare checksums of source and copy after every run.
    pub fn with_verification(mut self, algorithm: Option<ChecksumAlgorithm>) -> Self {
        self.verify = algorithm;
        self
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    pub fn verification(&self) -> Option<ChecksumAlgorithm> {
        self.verify
    }

    /// Run a backup using the local wall clock.
    pub fn run(&self, request: &BackupRequest) -> Result<BackupResult, BackupError> {
        self.run_at(request, Local::now(), None)
    }

    /// Run a backup and report state transitions to `progress`.
    pub fn run_with_progress(
        &self,
        request: &BackupRequest,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<BackupResult, BackupError> {
        self.run_at(request, Local::now(), progress)
    }

    /// Run a backup with `now` as the time embedded in a versioned target name.
    ///
    /// # Errors
    /// - `InvalidSource` / `DestinationUnavailable`: nothing was created
    /// - `Copy` / `Verification`: output may be partially written at the target
    ///
    /// A failed audit log write is returned as `BackupResult::log_warning`.
    pub fn run_at(
        &self,
        request: &BackupRequest,
        now: DateTime<Local>,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<BackupResult, BackupError> {
        let mut tracker = Tracker {
            request,
            progress,
            state: RunState::Idle,
        };

        if let Some(callback) = progress {
            callback.on_run_started(request);
        }

        let outcome = self.execute(&mut tracker, now);

        match &outcome {
            Ok(result) => {
                tracker.transition(RunState::Done);
                info!(
                    source = %request.source().display(),
                    target_path = %result.target_path.display(),
                    mode = %request.mode(),
                    size = %result.size_display(),
                    "backup completed"
                );
            }
            Err(e) => {
                let failed_in = tracker.state;
                tracker.transition(RunState::Failed);
                warn!(
                    source = %request.source().display(),
                    mode = %request.mode(),
                    state = %failed_in,
                    "backup failed: {}",
                    e
                );
            }
        }

        if let Some(callback) = progress {
            callback.on_run_completed(request, outcome.as_ref());
        }

        outcome
    }

    fn execute(&self, tracker: &mut Tracker<'_>, now: DateTime<Local>) -> Result<BackupResult, BackupError> {
        let request = tracker.request;
        let source = request.source();
        let destination_root = request.destination_root();

        tracker.transition(RunState::Validating);
        let source_metadata = fs::metadata(source).map_err(|e| BackupError::InvalidSource {
            path: source.to_path_buf(),
            source: e,
        })?;
        let source_is_dir = source_metadata.is_dir();
        if source_is_dir {
            reject_nested_destination(source, destination_root)?;
        }
        fs_ops::ensure_dir_exists(destination_root).map_err(|e| BackupError::DestinationUnavailable {
            path: destination_root.to_path_buf(),
            source: e,
        })?;

        tracker.transition(RunState::Copying);
        let target = naming::compute_target(
            &naming_source(source),
            destination_root,
            request.overwrite(),
            &now,
            source_is_dir,
        );
        reject_target_is_source(source, &target)?;
        let bytes_copied = fs_ops::copy_source(source, &target, request.overwrite())?;
        debug!(target_path = %target.display(), bytes_copied, "copy finished");

        if let Some(algorithm) = self.verify {
            tracker.transition(RunState::Verifying);
            let verified = verify::verify_copy(source, &target, algorithm)?;
            debug!(files = verified, %algorithm, "copy verified");
        }

        tracker.transition(RunState::Measuring);
        let size_bytes = size::size_of(&target);
        let timestamp = Local::now();

        tracker.transition(RunState::Logging);
        let entry = LogEntry {
            timestamp,
            source: source.to_path_buf(),
            target: target.clone(),
            mode: request.mode(),
            size_bytes,
        };
        let log_warning = match self.audit_log.append(&entry) {
            Ok(()) => None,
            Err(e) => {
                warn!(log = %self.audit_log.path().display(), "backup succeeded but was not logged: {}", e);
                Some(e)
            }
        };

        Ok(BackupResult {
            id: Uuid::new_v4(),
            target_path: target,
            size_bytes,
            timestamp,
            mode: request.mode(),
            log_warning,
        })
    }
}

/// Current state of one run, forwarded to the progress callback on every change.
struct Tracker<'a> {
    request: &'a BackupRequest,
    progress: Option<&'a dyn ProgressCallback>,
    state: RunState,
}

impl Tracker<'_> {
    fn transition(&mut self, state: RunState) {
        debug!(from = %self.state, to = %state, "run state");
        self.state = state;
        if let Some(callback) = self.progress {
            callback.on_state_changed(self.request, state);
        }
    }
}

/// Path whose final component names the backup.
///
/// Sources like `.` or `..` have no file name of their own, so the resolved path is used.
fn naming_source(source: &Path) -> PathBuf {
    if source.file_name().is_some() {
        return source.to_path_buf();
    }
    fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf())
}

/// A directory copied into itself would keep finding its own output.
///
/// The root may not exist yet, so its nearest existing ancestor is compared instead.
fn reject_nested_destination(source: &Path, destination_root: &Path) -> Result<(), BackupError> {
    let Ok(source) = fs::canonicalize(source) else {
        return Ok(());
    };
    let Some(root) = destination_root.ancestors().find_map(|p| fs::canonicalize(p).ok()) else {
        return Ok(());
    };

    if root.starts_with(&source) {
        return Err(BackupError::copy(
            &source,
            destination_root,
            io::Error::new(io::ErrorKind::InvalidInput, "destination lies inside the source directory"),
        ));
    }

    Ok(())
}

/// An overwrite target that resolves to the source would truncate or delete it before copying.
fn reject_target_is_source(source: &Path, target: &Path) -> Result<(), BackupError> {
    let (Ok(source), Ok(resolved)) = (fs::canonicalize(source), fs::canonicalize(target)) else {
        return Ok(());
    };

    if source == resolved {
        return Err(BackupError::copy(
            source,
            target,
            io::Error::new(io::ErrorKind::InvalidInput, "backup target is the source itself"),
        ));
    }

    Ok(())
}
