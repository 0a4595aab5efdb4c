//! Backup configuration.
//!
//! `Settings` is the on-disk TOML form. `BackupConfiguration` is what a caller hands
//! to every run; overwrite mode can only be switched on through a `Confirm` gate,
//! since it lets a run delete the previous copy.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;
use crate::model::{BackupMode, BackupRequest};
use crate::verify::ChecksumAlgorithm;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "lzbackup.toml";

/// Default interval between scheduled runs, in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 10;

/// Settings as stored in `lzbackup.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// File or directory to back up
    pub source: Option<PathBuf>,

    /// Directory that receives backups
    pub destination: PathBuf,

    /// Replace the previous copy instead of creating a timestamped one
    pub overwrite: bool,

    /// Minutes between scheduled runs (10..=300)
    pub interval_minutes: u32,

    /// Checksum used to validate each copy
    pub verify: Option<ChecksumAlgorithm>,

    /// Audit log location; beside the executable when unset
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            source: None,
            destination: default_destination(),
            overwrite: false,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            verify: None,
            log_file: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load_toml(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NoFile(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(toml::from_str(&contents)?)
    }

    /// Load settings if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_toml(path) {
            Err(ConfigError::NoFile(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Write settings as pretty TOML.
    pub fn save_toml(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Default backup root: `C:\LZbackup` on Windows, `./LZbackup` elsewhere.
pub fn default_destination() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\LZbackup")
    } else {
        PathBuf::from("LZbackup")
    }
}

/// Something that needs explicit user agreement before it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmPrompt {
    /// Switching to overwrite mode, which replaces earlier copies
    EnableOverwrite,
    /// Starting a manual run without overwrite mode
    ManualBackup,
}

impl ConfirmPrompt {
    pub fn message(&self) -> &'static str {
        match self {
            ConfirmPrompt::EnableOverwrite => {
                "Overwrite mode replaces the existing copy at the destination. \
                 Your previous backup may be lost. Continue?"
            }
            ConfirmPrompt::ManualBackup => "Start the backup now?",
        }
    }
}

/// Asks the user to agree to a prompt.
pub trait Confirm {
    fn confirm(&self, prompt: ConfirmPrompt) -> bool;
}

/// Agrees to everything; for unattended use where consent was given up front.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: ConfirmPrompt) -> bool {
        true
    }
}

/// Source, destination and naming policy shared by every run of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfiguration {
    source: PathBuf,
    destination_root: PathBuf,
    overwrite: bool,
}

impl BackupConfiguration {
    /// Configuration in timestamped (non-overwrite) mode.
    pub fn new(source: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        BackupConfiguration {
            source: source.into(),
            destination_root: destination_root.into(),
            overwrite: false,
        }
    }

    /// Build from settings, passing `overwrite = true` through the confirmation gate.
    ///
    /// If the confirmer declines, the configuration stays in timestamped mode.
    pub fn from_settings(settings: &Settings, confirm: &dyn Confirm) -> Result<Self, ConfigError> {
        let source = settings.source.clone().ok_or(ConfigError::MissingSource)?;
        let mut configuration = Self::new(source, settings.destination.clone());
        if settings.overwrite {
            configuration.enable_overwrite(confirm);
        }
        Ok(configuration)
    }

    /// Switch to overwrite mode if `confirm` agrees. Returns whether overwrite is now on.
    pub fn enable_overwrite(&mut self, confirm: &dyn Confirm) -> bool {
        if !self.overwrite && confirm.confirm(ConfirmPrompt::EnableOverwrite) {
            self.overwrite = true;
        }
        self.overwrite
    }

    /// Switching back to timestamped mode needs no confirmation.
    pub fn disable_overwrite(&mut self) {
        self.overwrite = false;
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

    /// A fresh request for one run.
    pub fn request(&self, mode: BackupMode) -> BackupRequest {
        BackupRequest::new(&self.source, &self.destination_root, self.overwrite, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Scripted {
        answer: bool,
        asked: Cell<usize>,
    }

    impl Confirm for Scripted {
        fn confirm(&self, prompt: ConfirmPrompt) -> bool {
            assert_eq!(prompt, ConfirmPrompt::EnableOverwrite);
            self.asked.set(self.asked.get() + 1);
            self.answer
        }
    }

    #[test]
    fn test_overwrite_requires_confirmation() {
        let mut configuration = BackupConfiguration::new("src", "dst");
        let decline = Scripted { answer: false, asked: Cell::new(0) };
        assert!(!configuration.enable_overwrite(&decline));
        assert!(!configuration.request(BackupMode::Manual).overwrite());

        let accept = Scripted { answer: true, asked: Cell::new(0) };
        assert!(configuration.enable_overwrite(&accept));
        assert!(configuration.enable_overwrite(&accept));
        assert_eq!(accept.asked.get(), 1, "Already enabled should not ask again");
        assert!(configuration.request(BackupMode::Automatic).overwrite());

        configuration.disable_overwrite();
        assert!(!configuration.overwrite());
    }

    #[test]
    fn test_settings_round_trip_through_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);

        let settings = Settings {
            source: Some(PathBuf::from("/home/user/docs")),
            overwrite: true,
            interval_minutes: 45,
            verify: Some(ChecksumAlgorithm::Blake3),
            ..Settings::default()
        };
        settings.save_toml(&path).expect("Failed to save settings");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("verify = \"blake3\""));
        assert_eq!(Settings::load_toml(&path).expect("Failed to load settings"), settings);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: Settings = toml::from_str("source = \"notes.txt\"").expect("Parse failed");
        assert_eq!(settings.source, Some(PathBuf::from("notes.txt")));
        assert_eq!(settings.destination, default_destination());
        assert_eq!(settings.interval_minutes, DEFAULT_INTERVAL_MINUTES);
        assert!(!settings.overwrite);
    }

    #[test]
    fn test_missing_file_and_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("absent.toml");

        assert!(matches!(Settings::load_toml(&path), Err(ConfigError::NoFile(_))));
        let settings = Settings::load_or_default(&path).expect("Defaults expected");
        assert!(matches!(
            BackupConfiguration::from_settings(&settings, &AssumeYes),
            Err(ConfigError::MissingSource)
        ));
    }

    #[test]
    fn test_from_settings_gates_overwrite() {
        let settings = Settings {
            source: Some(PathBuf::from("a")),
            overwrite: true,
            ..Settings::default()
        };
        let declined = Scripted { answer: false, asked: Cell::new(0) };

        let configuration = BackupConfiguration::from_settings(&settings, &declined).unwrap();
        assert!(!configuration.overwrite());
        assert_eq!(declined.asked.get(), 1);

        let configuration = BackupConfiguration::from_settings(&settings, &AssumeYes).unwrap();
        assert!(configuration.overwrite());
    }
}
