//! # LZbackup Engine - File and Folder Backup Library
//!
//! A headless backup engine that copies a file or directory into a backup root,
//! either as a timestamped version or by replacing the previous copy, and records
//! every completed run in an append-only audit log.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{AuditLog, BackupEngine, BackupMode, BackupRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = BackupEngine::new(AuditLog::beside_executable());
//! let request = BackupRequest::new("C:\\work\\thesis", "D:\\LZbackup", false, BackupMode::Manual);
//!
//! let result = engine.run(&request)?;
//! println!("Saved to {} ({})", result.target_path.display(), result.size_display());
//! if let Some(warning) = &result.log_warning {
//!     eprintln!("Backup not logged: {warning}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Request/result types and run states
//! - **error**: Error types and handling
//! - **naming**: Target path computation
//! - **fs_ops**: File and tree copying
//! - **size**: Size measurement and formatting
//! - **audit**: Append-only audit log
//! - **verify**: Checksum validation of copies
//! - **backup**: Run orchestration
//! - **config**: Settings file and the overwrite confirmation gate
//! - **schedule**: Periodic automatic runs
//! - **progress**: Progress callback trait

pub mod model;
pub mod error;
pub mod naming;
pub mod fs_ops;
pub mod size;
pub mod audit;
pub mod verify;
pub mod backup;
pub mod config;
pub mod schedule;
pub mod progress;

// Re-export main types and functions
pub use model::{BackupMode, BackupRequest, BackupResult, RunState};
pub use error::{BackupError, ConfigError, ErrorKind};
pub use naming::compute_target;
pub use size::{format_size, size_of};
pub use audit::{AuditLog, FailureEntry, LogEntry};
pub use verify::{compute_file_checksum, verify_copy, ChecksumAlgorithm, ChecksumValue};
pub use backup::BackupEngine;
pub use config::{AssumeYes, BackupConfiguration, Confirm, ConfirmPrompt, Settings};
pub use schedule::{ScheduleInterval, Scheduler};
pub use progress::ProgressCallback;
