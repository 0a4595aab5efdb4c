//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which lets a front end follow
//! a run through its states without the engine knowing anything about the UI.

use crate::error::BackupError;
use crate::model::{BackupRequest, BackupResult, RunState};

/// Trait for receiving progress updates from a backup run.
///
/// All methods are called synchronously on the thread executing the run.
pub trait ProgressCallback: Send + Sync {
    /// Called once before validation starts.
    fn on_run_started(&self, request: &BackupRequest);

    /// Called on every state transition, terminal states included.
    fn on_state_changed(&self, request: &BackupRequest, state: RunState);

    /// Called once with the final outcome.
    fn on_run_completed(&self, request: &BackupRequest, outcome: Result<&BackupResult, &BackupError>);
}
