//! Periodic scheduling of automatic runs.
//!
//! A `Scheduler` owns two threads: a ticker that fires once per interval, and a
//! single worker that executes every run. Manual runs requested through
//! [`Scheduler::run_now`] go to the same worker, so a manual run and a scheduled
//! run never touch the destination at the same time.
//!
//! Scheduled runs never report errors to a caller. A failure is logged with
//! `tracing`, recorded in the audit log if possible, and the next tick runs as usual.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use chrono::Local;
use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, info};
use crate::audit::FailureEntry;
use crate::backup::BackupEngine;
use crate::config::BackupConfiguration;
use crate::error::{BackupError, ConfigError};
use crate::model::{BackupMode, BackupResult};
use crate::progress::ProgressCallback;

/// Shortest allowed interval between scheduled runs, in minutes.
pub const MIN_INTERVAL_MINUTES: u32 = 10;

/// Longest allowed interval between scheduled runs, in minutes.
pub const MAX_INTERVAL_MINUTES: u32 = 300;

/// Time between scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleInterval(Duration);

impl ScheduleInterval {
    /// Interval of whole minutes within `MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES`.
    pub fn from_minutes(minutes: u32) -> Result<Self, ConfigError> {
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes) {
            return Err(ConfigError::IntervalOutOfRange {
                minutes,
                min: MIN_INTERVAL_MINUTES,
                max: MAX_INTERVAL_MINUTES,
            });
        }
        Ok(ScheduleInterval(Duration::from_secs(u64::from(minutes) * 60)))
    }

    #[cfg(test)]
    pub(crate) fn from_duration(duration: Duration) -> Self {
        ScheduleInterval(duration)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

type RunOutcome = Result<BackupResult, BackupError>;

enum Command {
    Manual(Sender<RunOutcome>),
    Stop,
}

/// Runs backups periodically on a background worker.
pub struct Scheduler {
    commands: Sender<Command>,
    stop_ticker: Option<Sender<()>>,
    ticker: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start ticking. The first scheduled run happens one interval from now.
    pub fn spawn(
        engine: BackupEngine,
        configuration: BackupConfiguration,
        interval: ScheduleInterval,
        progress: Option<Arc<dyn ProgressCallback>>,
    ) -> Self {
        let (command_tx, command_rx) = unbounded();
        // Capacity 1: ticks that arrive while a run is in progress collapse into one
        let (tick_tx, tick_rx) = bounded(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);

        info!(
            source = %configuration.source().display(),
            destination = %configuration.destination_root().display(),
            overwrite = configuration.overwrite(),
            interval_secs = interval.as_duration().as_secs(),
            "scheduler started"
        );

        let worker = thread::spawn(move || {
            worker_loop(&engine, &configuration, progress.as_deref(), &command_rx, &tick_rx)
        });
        let ticker = thread::spawn(move || ticker_loop(interval.as_duration(), &stop_rx, &tick_tx));

        Scheduler {
            commands: command_tx,
            stop_ticker: Some(stop_tx),
            ticker: Some(ticker),
            worker: Some(worker),
        }
    }

    /// Run a manual backup on the worker, after any run already in progress.
    ///
    /// Returns `None` if the scheduler has stopped.
    pub fn run_now(&self) -> Option<RunOutcome> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands.send(Command::Manual(reply_tx)).ok()?;
        reply_rx.recv().ok()
    }

    /// Stop ticking and wait for the current run, if any, to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the ticker's stop channel
        self.stop_ticker.take();
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }

        let _ = self.commands.send(Command::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!("scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

fn ticker_loop(interval: Duration, stop: &Receiver<()>, ticks: &Sender<()>) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => match ticks.try_send(()) {
                Ok(()) => {}
                Err(TrySendError::Full(())) => debug!("previous run still in progress, tick coalesced"),
                Err(TrySendError::Disconnected(())) => break,
            },
            _ => break,
        }
    }
}

fn worker_loop(
    engine: &BackupEngine,
    configuration: &BackupConfiguration,
    progress: Option<&dyn ProgressCallback>,
    commands: &Receiver<Command>,
    ticks: &Receiver<()>,
) {
    loop {
        select! {
            recv(commands) -> command => match command {
                Ok(Command::Manual(reply)) => {
                    let request = configuration.request(BackupMode::Manual);
                    let _ = reply.send(engine.run_with_progress(&request, progress));
                }
                Ok(Command::Stop) | Err(_) => break,
            },
            recv(ticks) -> tick => match tick {
                Ok(()) => run_automatic(engine, configuration, progress),
                Err(_) => break,
            },
        }
    }
}

/// One scheduled run. Nothing escapes: not errors, not panics.
fn run_automatic(
    engine: &BackupEngine,
    configuration: &BackupConfiguration,
    progress: Option<&dyn ProgressCallback>,
) {
    let request = configuration.request(BackupMode::Automatic);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.run_with_progress(&request, progress)));

    let err = match outcome {
        Ok(Ok(_)) => return,
        Ok(Err(e)) => e,
        Err(_) => {
            error!(source = %request.source().display(), "scheduled backup panicked");
            return;
        }
    };

    error!(source = %request.source().display(), "scheduled backup failed: {}", err);
    let entry = FailureEntry::new(
        Local::now(),
        request.source(),
        request.destination_root(),
        BackupMode::Automatic,
        &err,
    );
    if let Err(log_err) = engine.audit_log().append_failure(&entry) {
        debug!("failure not recorded: {}", log_err);
    }
}
