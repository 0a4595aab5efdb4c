//! Size accounting for backup output.
//!
//! Measuring never fails: entries that disappear or cannot be read while walking
//! a tree are skipped and contribute nothing to the total.

use std::fs;
use std::path::Path;

const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// Total size in bytes of a file, or of every regular file below a directory.
pub fn size_of(path: &Path) -> u64 {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => dir_size(path),
        Ok(metadata) => metadata.len(),
        Err(_) => 0,
    }
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let entry_path = entry.path();
            match entry.file_type() {
                // Only descend into real directories so link cycles cannot recurse forever
                Ok(file_type) if file_type.is_dir() => dir_size(&entry_path),
                Ok(_) => match fs::metadata(&entry_path) {
                    Ok(metadata) if metadata.is_file() => metadata.len(),
                    _ => 0,
                },
                Err(_) => 0,
            }
        })
        .sum()
}

/// Render a byte count with two decimals in the largest unit below 1024, up to TB.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(1024u64.pow(4) * 2), "2.00 TB");
    }

    #[test]
    fn test_format_size_stays_in_tb() {
        assert_eq!(format_size(1024u64.pow(5)), "1024.00 TB");
    }

    #[test]
    fn test_size_of_file_and_missing_path() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("data.bin");
        fs::write(&file, vec![0u8; 300]).unwrap();

        assert_eq!(size_of(&file), 300);
        assert_eq!(size_of(&temp_dir.path().join("gone")), 0);
    }

    #[test]
    fn test_size_of_nested_tree_sums_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("tree");
        let files = [
            (root.join("a.txt"), 10usize),
            (root.join("sub").join("b.txt"), 200),
            (root.join("sub").join("deep").join("c.txt"), 3000),
        ];
        fs::create_dir_all(root.join("sub").join("deep")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        for (path, len) in &files {
            fs::write(path, vec![b'x'; *len]).unwrap();
        }

        let expected: u64 = files.iter().map(|(path, _)| size_of(path)).sum();
        assert_eq!(expected, 3210);
        assert_eq!(size_of(&root), expected);
    }
}
