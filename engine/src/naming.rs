//! Target naming for backup runs.
//!
//! Versioned runs append a local timestamp (`YYYYMMDD-HH-MM-SS`) to the source name;
//! overwrite runs reuse the source name unchanged so each run lands on the same path.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use chrono::{DateTime, TimeZone};

/// Timestamp format embedded in versioned target names.
pub const TARGET_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H-%M-%S";

/// Name used when the source path has no final component (e.g. a filesystem root).
const FALLBACK_NAME: &str = "backup";

/// Compute where a run should place its copy.
///
/// # Arguments
/// * `source` - File or directory being backed up
/// * `destination_root` - Directory that receives backups
/// * `overwrite` - Reuse the source name instead of versioning it
/// * `now` - Time used for the version suffix
/// * `source_is_dir` - Whether the source is a directory (directories keep dots in their name)
pub fn compute_target<Tz: TimeZone>(
    source: &Path,
    destination_root: &Path,
    overwrite: bool,
    now: &DateTime<Tz>,
    source_is_dir: bool,
) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    let base = source
        .file_name()
        .unwrap_or_else(|| OsStr::new(FALLBACK_NAME));

    if overwrite {
        return destination_root.join(base);
    }

    let stamp = now.format(TARGET_TIMESTAMP_FORMAT).to_string();
    let mut name = OsString::new();

    if source_is_dir {
        name.push(base);
        name.push("-");
        name.push(&stamp);
    } else {
        let base_path = Path::new(base);
        name.push(base_path.file_stem().unwrap_or(base));
        name.push("-");
        name.push(&stamp);
        if let Some(ext) = base_path.extension() {
            name.push(".");
            name.push(ext);
        }
    }

    destination_root.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, Utc};

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap()
    }

    #[test]
    fn test_versioned_file_keeps_extension() {
        let target = compute_target(
            Path::new("/data/report.txt"),
            Path::new("/backups"),
            false,
            &fixed_time(),
            false,
        );
        assert_eq!(target, PathBuf::from("/backups/report-20240307-09-05-02.txt"));
    }

    #[test]
    fn test_versioned_file_uses_last_extension_only() {
        let target = compute_target(
            Path::new("archive.tar.gz"),
            Path::new("out"),
            false,
            &fixed_time(),
            false,
        );
        assert_eq!(target, PathBuf::from("out/archive.tar-20240307-09-05-02.gz"));
    }

    #[test]
    fn test_versioned_dotfile_has_no_extension() {
        let target = compute_target(
            Path::new(".bashrc"),
            Path::new("out"),
            false,
            &fixed_time(),
            false,
        );
        assert_eq!(target, PathBuf::from("out/.bashrc-20240307-09-05-02"));
    }

    #[test]
    fn test_versioned_directory_keeps_dots() {
        let target = compute_target(
            Path::new("/home/user/project.v2"),
            Path::new("/backups"),
            false,
            &fixed_time(),
            true,
        );
        assert_eq!(target, PathBuf::from("/backups/project.v2-20240307-09-05-02"));
    }

    #[test]
    fn test_overwrite_uses_plain_name() {
        let now = Local::now();
        let file = compute_target(Path::new("/data/report.txt"), Path::new("/b"), true, &now, false);
        let dir = compute_target(Path::new("/data/photos/"), Path::new("/b"), true, &now, true);
        assert_eq!(file, PathBuf::from("/b/report.txt"));
        assert_eq!(dir, PathBuf::from("/b/photos"));
    }

    #[test]
    fn test_root_source_falls_back() {
        let target = compute_target(Path::new("/"), Path::new("/b"), true, &fixed_time(), true);
        assert_eq!(target, PathBuf::from("/b/backup"));
    }
}
