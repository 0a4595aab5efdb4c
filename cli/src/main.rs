//! LZbackup - Command-line front end for the backup engine.
//!
//! Runs one backup (`run`), keeps backing up on a timer (`schedule`), writes a
//! starter configuration (`init`), or prints the audit log (`log`).

mod logger;

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use engine::{
    config::DEFAULT_CONFIG_FILE,
    schedule::{MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES},
    AssumeYes, AuditLog, BackupConfiguration, BackupEngine, BackupError, BackupMode,
    BackupRequest, BackupResult, ChecksumAlgorithm, ConfigError, Confirm, ConfirmPrompt,
    ProgressCallback, RunState, ScheduleInterval, Scheduler, Settings,
};

/// LZbackup - back up a file or folder, by hand or on a timer
#[derive(Parser, Debug)]
#[command(name = "lzbackup")]
#[command(version)]
#[command(about = "Back up a file or folder into a timestamped or overwritten copy")]
struct Cli {
    /// Configuration file (default: ./lzbackup.toml if present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one manual backup
    Run(BackupArgs),

    /// Back up automatically every few minutes until stopped
    Schedule(ScheduleArgs),

    /// Write a default configuration file
    Init {
        /// Replace an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Print the audit log
    Log {
        /// Audit log to read (default: from the config file, else beside the executable)
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
struct BackupArgs {
    /// File or folder to back up
    #[arg(long, value_name = "PATH")]
    src: Option<PathBuf>,

    /// Backup root directory
    #[arg(long, value_name = "PATH")]
    dst: Option<PathBuf>,

    /// Replace the previous copy instead of creating a timestamped one
    #[arg(long)]
    overwrite: bool,

    /// Answer yes to every confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,

    /// Validate each copy with a checksum: md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM")]
    verify: Option<ChecksumAlgorithm>,

    /// Audit log file (default: beside the executable)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScheduleArgs {
    #[command(flatten)]
    backup: BackupArgs,

    /// Minutes between automatic backups (10-300)
    #[arg(long, value_name = "MINUTES")]
    interval: Option<u32>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Backup failed: {}", engine::audit::error_chain(.0))]
    Backup(#[from] BackupError),

    #[error("Configuration file already exists: {} (use --force to replace it)", .0.display())]
    ConfigExists(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Backup cancelled")]
    Cancelled,
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Backup(_) | CliError::Cancelled => 1,
            _ => 2,
        }
    }
}

/// Confirmation prompts answered on the terminal
struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: ConfirmPrompt) -> bool {
        eprint!("{} [y/N] ", prompt.message());
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

/// CLI implementation of ProgressCallback: prints state changes when verbose
struct CliProgress {
    verbose: bool,
}

impl ProgressCallback for CliProgress {
    fn on_run_started(&self, request: &BackupRequest) {
        if self.verbose {
            eprintln!(
                "Backing up {} into {} ({}, {})",
                request.source().display(),
                request.destination_root().display(),
                request.mode(),
                if request.overwrite() { "overwrite" } else { "timestamped" }
            );
        }
    }

    fn on_state_changed(&self, _request: &BackupRequest, state: RunState) {
        if self.verbose && !state.is_terminal() {
            eprintln!("  {}...", state);
        }
    }

    fn on_run_completed(&self, request: &BackupRequest, outcome: Result<&BackupResult, &BackupError>) {
        // Scheduled runs have no one waiting for their result
        if !request.mode().is_automatic() {
            return;
        }
        if let Ok(result) = outcome {
            eprintln!(
                "[{}] Automatic backup saved to {} ({})",
                result.timestamp.format("%Y-%m-%d %H:%M:%S"),
                result.target_path.display(),
                result.size_display()
            );
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_logger(cli.verbose) {
        eprintln!("Warning: {}", e);
    }

    let exit_code = match run_cli(&cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Run(args) => {
            let settings = merge_settings(load_settings(cli.config.as_deref())?, args);
            let result = run_backup(&settings, args.yes, cli.verbose)?;
            print_result(&result);
            Ok(())
        }
        Command::Schedule(args) => {
            let mut settings = merge_settings(load_settings(cli.config.as_deref())?, &args.backup);
            if let Some(minutes) = args.interval {
                settings.interval_minutes = minutes;
            }
            run_schedule(&settings, args.backup.yes, cli.verbose)
        }
        Command::Init { force } => {
            let path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            init_config(&path, *force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Command::Log { log_file } => {
            let log = match log_file {
                Some(path) => AuditLog::new(path),
                None => load_settings(cli.config.as_deref())?
                    .log_file
                    .map(AuditLog::new)
                    .unwrap_or_else(AuditLog::beside_executable),
            };
            print!("{}", read_log(&log)?);
            Ok(())
        }
    }
}

/// Settings from an explicit config file, or `./lzbackup.toml` if it exists.
fn load_settings(config: Option<&Path>) -> Result<Settings, CliError> {
    let settings = match config {
        Some(path) => Settings::load_toml(path)?,
        None => Settings::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    Ok(settings)
}

/// Command-line flags take precedence over the configuration file.
fn merge_settings(mut settings: Settings, args: &BackupArgs) -> Settings {
    if let Some(src) = &args.src {
        settings.source = Some(src.clone());
    }
    if let Some(dst) = &args.dst {
        settings.destination = dst.clone();
    }
    if args.overwrite {
        settings.overwrite = true;
    }
    if args.verify.is_some() {
        settings.verify = args.verify;
    }
    if let Some(log_file) = &args.log_file {
        settings.log_file = Some(log_file.clone());
    }
    settings
}

fn build_engine(settings: &Settings) -> BackupEngine {
    let log = settings
        .log_file
        .clone()
        .map(AuditLog::new)
        .unwrap_or_else(AuditLog::beside_executable);

    if let Err(e) = log.ensure_exists() {
        warn!("audit log unavailable, backups will not be recorded: {}", e);
    }

    BackupEngine::new(log).with_verification(settings.verify)
}

fn confirmer(assume_yes: bool) -> Box<dyn Confirm> {
    if assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalConfirm)
    }
}

fn run_backup(settings: &Settings, assume_yes: bool, verbose: bool) -> Result<BackupResult, CliError> {
    let confirm = confirmer(assume_yes);
    let configuration = BackupConfiguration::from_settings(settings, confirm.as_ref())?;

    if !configuration.overwrite() && !confirm.confirm(ConfirmPrompt::ManualBackup) {
        return Err(CliError::Cancelled);
    }

    let backup_engine = build_engine(settings);
    let progress = CliProgress { verbose };
    let result = backup_engine.run_with_progress(&configuration.request(BackupMode::Manual), Some(&progress))?;
    Ok(result)
}

fn print_result(result: &BackupResult) {
    println!("Backup saved to: {}", result.target_path.display());
    println!("Size: {}", result.size_display());
    if let Some(warning) = &result.log_warning {
        eprintln!("Warning: {}", engine::audit::error_chain(warning));
    }
}

fn run_schedule(settings: &Settings, assume_yes: bool, verbose: bool) -> Result<(), CliError> {
    let interval = ScheduleInterval::from_minutes(settings.interval_minutes)?;
    let configuration = BackupConfiguration::from_settings(settings, confirmer(assume_yes).as_ref())?;
    let backup_engine = build_engine(settings);

    let scheduler = Scheduler::spawn(
        backup_engine,
        configuration,
        interval,
        Some(Arc::new(CliProgress { verbose })),
    );

    println!(
        "Automatic backup every {} minutes ({}-{} allowed).",
        settings.interval_minutes, MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES
    );
    println!("Press Enter to back up now, or type q and Enter to quit.");

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        match line.trim() {
            "q" | "quit" | "exit" => {
                scheduler.stop();
                return Ok(());
            }
            _ => match scheduler.run_now() {
                Some(Ok(result)) => print_result(&result),
                Some(Err(e)) => eprintln!("Error: Backup failed: {}", engine::audit::error_chain(&e)),
                None => break,
            },
        }
    }

    // No interactive input left: keep the timer running until the process is killed
    loop {
        std::thread::park();
    }
}

fn init_config(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists(path.to_path_buf()));
    }
    Settings::default().save_toml(path)?;
    Ok(())
}

fn read_log(log: &AuditLog) -> Result<String, CliError> {
    match fs::read_to_string(log.path()) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            eprintln!("Log file does not exist yet: {}", log.path().display());
            Ok(String::new())
        }
        Err(e) => Err(CliError::Io {
            path: log.path().to_path_buf(),
            source: e,
        }),
    }
}
