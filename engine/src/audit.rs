//! Append-only audit log of completed runs.
//!
//! One UTF-8 line per run:
//!
//! ```text
//! [2024-03-07 09:05:02] /data/report.txt -> /backups/report-20240307-09-05-02.txt | 手动保存 | 1.50 KB
//! ```
//!
//! The file is opened in append mode for every line and closed again, so earlier
//! history is never truncated or rewritten.

use std::error::Error;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use crate::error::BackupError;
use crate::model::BackupMode;
use crate::size::format_size;

/// File name of the audit log when no explicit path is configured.
pub const DEFAULT_LOG_FILE_NAME: &str = "lzbackup.log";

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A completed run, as recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub source: PathBuf,
    pub target: PathBuf,
    pub mode: BackupMode,
    pub size_bytes: u64,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {} | {} | {}",
            self.timestamp.format(LOG_TIMESTAMP_FORMAT),
            self.source.display(),
            self.target.display(),
            self.mode.log_label(),
            format_size(self.size_bytes)
        )
    }
}

/// A scheduled run that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub timestamp: DateTime<Local>,
    pub source: PathBuf,
    pub destination_root: PathBuf,
    pub mode: BackupMode,
    pub message: String,
}

impl FailureEntry {
    pub fn new(
        timestamp: DateTime<Local>,
        source: &Path,
        destination_root: &Path,
        mode: BackupMode,
        error: &BackupError,
    ) -> Self {
        FailureEntry {
            timestamp,
            source: source.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
            mode,
            message: error_chain(error),
        }
    }
}

impl fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {} | {} | FAILED: {}",
            self.timestamp.format(LOG_TIMESTAMP_FORMAT),
            self.source.display(),
            self.destination_root.display(),
            self.mode.log_label(),
            self.message
        )
    }
}

/// Render an error and its sources on a single line.
pub fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message.replace(['\r', '\n'], " ")
}

/// Handle to the audit log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AuditLog { path: path.into() }
    }

    /// Audit log placed beside the running executable.
    pub fn beside_executable() -> Self {
        Self::new(default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the log file empty if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), BackupError> {
        self.open().map(drop)
    }

    /// Append one completed run.
    pub fn append(&self, entry: &LogEntry) -> Result<(), BackupError> {
        self.append_line(&entry.to_string())
    }

    /// Append one failed scheduled run.
    pub fn append_failure(&self, entry: &FailureEntry) -> Result<(), BackupError> {
        self.append_line(&entry.to_string())
    }

    fn append_line(&self, line: &str) -> Result<(), BackupError> {
        let mut file = self.open()?;
        let mut buffer = String::with_capacity(line.len() + 1);
        buffer.push_str(line);
        buffer.push('\n');

        // Single write per line keeps concurrent appenders from interleaving mid-line
        file.write_all(buffer.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| self.write_error(e))
    }

    fn open(&self) -> Result<std::fs::File, BackupError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(e))
    }

    fn write_error(&self, source: std::io::Error) -> BackupError {
        BackupError::LogWrite {
            path: self.path.clone(),
            source,
        }
    }
}

/// `lzbackup.log` in the directory of the running executable, or the working
/// directory if the executable path cannot be determined.
pub fn default_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_LOG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use crate::error::ErrorKind;

    fn entry(size_bytes: u64) -> LogEntry {
        LogEntry {
            timestamp: Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap(),
            source: PathBuf::from("src.txt"),
            target: PathBuf::from("out").join("src-20240307-09-05-02.txt"),
            mode: BackupMode::Manual,
            size_bytes,
        }
    }

    #[test]
    fn test_entry_line_format() {
        let line = entry(1536).to_string();
        let target = PathBuf::from("out").join("src-20240307-09-05-02.txt");
        assert_eq!(
            line,
            format!("[2024-03-07 09:05:02] src.txt -> {} | 手动保存 | 1.50 KB", target.display())
        );
    }

    #[test]
    fn test_append_preserves_history() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let log = AuditLog::new(temp_dir.path().join("lzbackup.log"));

        log.ensure_exists().expect("Failed to create log");
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "");

        log.append(&entry(1)).expect("First append failed");
        log.append(&entry(2048)).expect("Second append failed");
        log.ensure_exists().expect("Reopen failed");

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("| 1.00 B"));
        assert!(lines[1].ends_with("| 2.00 KB"));
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_failure_line_is_single_line() {
        let err = BackupError::InvalidSource {
            path: PathBuf::from("gone"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not\nfound"),
        };
        let failure = FailureEntry::new(
            Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap(),
            Path::new("gone"),
            Path::new("backups"),
            BackupMode::Automatic,
            &err,
        );
        let line = failure.to_string();
        assert!(line.starts_with("[2024-03-07 09:05:02] gone -> backups | 自动保存 | FAILED: "));
        assert!(line.contains("Invalid backup source: gone: not found"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_unwritable_log_reports_log_write() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let log = AuditLog::new(blocker.join("lzbackup.log"));
        let err = log.append(&entry(1)).expect_err("Append should fail");
        assert_eq!(err.kind(), ErrorKind::LogWrite);
    }
}
