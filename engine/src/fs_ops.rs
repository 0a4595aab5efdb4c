//! Filesystem operations module.
//!
//! This module provides the copy primitives used by a run:
//! - Copying single files with permissions and timestamps
//! - Copying whole directory trees, including empty subdirectories
//! - Replacing an existing target tree in overwrite mode

use std::fs;
use std::io;
use std::path::Path;
use filetime::FileTime;
use tracing::debug;
use crate::error::BackupError;

/// Copy `source` to `target`, applying the overwrite policy for directories.
///
/// Files always replace whatever file already sits at `target`; `overwrite` only
/// decides whether an existing target *directory* is deleted before copying. With
/// `overwrite` off an existing target directory is a name collision and fails.
///
/// # Errors
/// Returns `BackupError::Copy` for any I/O failure. Partial output is left in place.
pub fn copy_source(source: &Path, target: &Path, overwrite: bool) -> Result<u64, BackupError> {
    let metadata = fs::metadata(source).map_err(|e| BackupError::copy(source, target, e))?;

    if !metadata.is_dir() {
        return copy_file_with_metadata(source, target);
    }

    if overwrite && target.is_dir() {
        debug!(target_path = %target.display(), "removing previous backup tree");
        fs::remove_dir_all(target).map_err(|e| BackupError::copy(source, target, e))?;
    }

    copy_tree(source, target)
}

/// Copy a file from source to destination with metadata preservation.
///
/// Permissions, access time and modification time are carried over. Parent
/// directories of `dst` are created as needed and an existing file is replaced.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, BackupError> {
    ensure_parent_dir_exists(dst).map_err(|e| BackupError::copy(src, dst, e))?;

    let mut src_file = fs::File::open(src).map_err(|e| BackupError::copy(src, dst, e))?;
    let src_metadata = src_file
        .metadata()
        .map_err(|e| BackupError::copy(src, dst, e))?;

    let mut dst_file = match fs::File::create(dst) {
        Ok(file) => file,
        // A previous copy of a read-only source cannot be truncated in place
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && dst.is_file() => {
            make_writable(dst).map_err(|_| BackupError::copy(src, dst, e))?;
            fs::File::create(dst).map_err(|e| BackupError::copy(src, dst, e))?
        }
        Err(e) => return Err(BackupError::copy(src, dst, e)),
    };

    let bytes_copied =
        io::copy(&mut src_file, &mut dst_file).map_err(|e| BackupError::copy(src, dst, e))?;
    drop(dst_file);

    copy_metadata(&src_metadata, dst).map_err(|e| BackupError::copy(src, dst, e))?;

    Ok(bytes_copied)
}

/// Recursively copy the directory `src` to the new directory `dst`.
///
/// `dst` itself must not exist yet; its parents are created as needed.
///
/// # Returns
/// Total number of file bytes copied
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64, BackupError> {
    ensure_parent_dir_exists(dst).map_err(|e| BackupError::copy(src, dst, e))?;
    fs::create_dir(dst).map_err(|e| BackupError::copy(src, dst, e))?;

    fn recurse(src: &Path, dst: &Path) -> Result<u64, BackupError> {
        let mut bytes = 0;

        let entries = fs::read_dir(src).map_err(|e| BackupError::copy(src, dst, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::copy(src, dst, e))?;
            let entry_src = entry.path();
            let entry_dst = dst.join(entry.file_name());

            // Follows symlinks so linked content is copied, not the link
            let metadata =
                fs::metadata(&entry_src).map_err(|e| BackupError::copy(&entry_src, &entry_dst, e))?;

            if metadata.is_dir() {
                fs::create_dir(&entry_dst)
                    .map_err(|e| BackupError::copy(&entry_src, &entry_dst, e))?;
                bytes += recurse(&entry_src, &entry_dst)?;
            } else {
                bytes += copy_file_with_metadata(&entry_src, &entry_dst)?;
            }
        }

        // Directory metadata last: filling the directory would bump its mtime,
        // and a read-only mode would block the copy.
        let src_metadata = fs::metadata(src).map_err(|e| BackupError::copy(src, dst, e))?;
        copy_metadata(&src_metadata, dst).map_err(|e| BackupError::copy(src, dst, e))?;

        Ok(bytes)
    }

    recurse(src, dst)
}

/// Apply permissions and timestamps from `metadata` to `path`.
fn copy_metadata(metadata: &fs::Metadata, path: &Path) -> io::Result<()> {
    let mtime = FileTime::from_last_modification_time(metadata);
    let atime = FileTime::from_last_access_time(metadata);
    filetime::set_file_times(path, atime, mtime)?;
    fs::set_permissions(path, metadata.permissions())
}

#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> io::Result<()> {
    match path.parent() {
        // Skip if parent is empty path (relative root)
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Ensure `path` is a directory, creating it and all of its parents if necessary.
///
/// Fails if `path` exists but is not a directory.
pub fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Path exists but is not a directory",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(path),
        Err(e) => Err(e),
    }
}
