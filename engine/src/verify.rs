//! Checksum validation of copied output.
//!
//! This module provides:
//! - Streaming checksums over MD5, SHA-256 and BLAKE3
//! - Comparison of a source file or tree against its backup copy

use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::BackupError;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// MD5 (fast, not collision resistant)
    Md5,
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            _ => Err(format!("unknown checksum algorithm '{s}'; expected md5, sha256 or blake3")),
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    pub fn new(algorithm: ChecksumAlgorithm, hex: String) -> Self {
        ChecksumValue { algorithm, hex }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Incremental hasher over one of the supported algorithms
enum Hasher {
    Md5(md5::Context),
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(<sha2::Sha256 as sha2::Digest>::new()),
            ChecksumAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(context) => context.consume(data),
            Hasher::Sha256(hasher) => sha2::Digest::update(hasher, data),
            Hasher::Blake3(hasher) => {
                hasher.update(data);
            }
        }
    }

    fn finalize(self) -> ChecksumValue {
        match self {
            Hasher::Md5(context) => {
                ChecksumValue::new(ChecksumAlgorithm::Md5, format!("{:x}", context.compute()))
            }
            Hasher::Sha256(hasher) => ChecksumValue::new(
                ChecksumAlgorithm::Sha256,
                format!("{:x}", sha2::Digest::finalize(hasher)),
            ),
            Hasher::Blake3(hasher) => {
                ChecksumValue::new(ChecksumAlgorithm::Blake3, hasher.finalize().to_hex().to_string())
            }
        }
    }
}

/// Compute the checksum of a file by streaming its contents.
pub fn compute_file_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> std::io::Result<ChecksumValue> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 65536]; // 64 KB buffer

    loop {
        match file.read(&mut buffer)? {
            0 => break,
            n => hasher.update(&buffer[..n]),
        }
    }

    Ok(hasher.finalize())
}

/// Compare every regular file of `source` against its counterpart under `target`.
///
/// `source` may be a single file (compared with `target` directly) or a directory
/// tree mirrored at `target`.
///
/// # Returns
/// Number of files verified
///
/// # Errors
/// `BackupError::Verification` naming the first file that is missing, unreadable
/// or different in the copy.
pub fn verify_copy(source: &Path, target: &Path, algorithm: ChecksumAlgorithm) -> Result<usize, BackupError> {
    let metadata = fs::metadata(source).map_err(|e| mismatch(source, format!("cannot read source: {e}")))?;

    if !metadata.is_dir() {
        verify_file(source, target, algorithm)?;
        return Ok(1);
    }

    let mut verified = 0;
    let entries = fs::read_dir(source).map_err(|e| mismatch(source, format!("cannot list source: {e}")))?;
    for entry in entries {
        let entry = entry.map_err(|e| mismatch(source, format!("cannot list source: {e}")))?;
        verified += verify_copy(&entry.path(), &target.join(entry.file_name()), algorithm)?;
    }

    Ok(verified)
}

fn verify_file(source: &Path, target: &Path, algorithm: ChecksumAlgorithm) -> Result<(), BackupError> {
    let expected = compute_file_checksum(source, algorithm)
        .map_err(|e| mismatch(source, format!("cannot read source: {e}")))?;
    let actual = compute_file_checksum(target, algorithm)
        .map_err(|e| mismatch(target, format!("cannot read copy: {e}")))?;

    if expected != actual {
        return Err(mismatch(
            target,
            format!("{algorithm} mismatch (expected {}, got {})", expected.hex(), actual.hex()),
        ));
    }

    Ok(())
}

fn mismatch(path: &Path, reason: String) -> BackupError {
    BackupError::Verification {
        path: path.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_known_digests() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("abc.txt");
        fs::write(&file, b"abc").unwrap();

        let md5 = compute_file_checksum(&file, ChecksumAlgorithm::Md5).unwrap();
        assert_eq!(md5.hex(), "900150983cd24fb0d6963f7d28e17f72");

        let sha = compute_file_checksum(&file, ChecksumAlgorithm::Sha256).unwrap();
        assert_eq!(
            sha.hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let blake = compute_file_checksum(&file, ChecksumAlgorithm::Blake3).unwrap();
        assert_eq!(blake.hex(), blake3::hash(b"abc").to_hex().as_str());
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("SHA256".parse::<ChecksumAlgorithm>(), Ok(ChecksumAlgorithm::Sha256));
        assert_eq!("blake3".parse::<ChecksumAlgorithm>(), Ok(ChecksumAlgorithm::Blake3));
        assert!("crc32".parse::<ChecksumAlgorithm>().is_err());
    }

    #[test]
    fn test_verify_tree_detects_modified_copy() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::create_dir_all(dst.join("sub")).unwrap();
        fs::write(src.join("a.txt"), b"same").unwrap();
        fs::write(dst.join("a.txt"), b"same").unwrap();
        fs::write(src.join("sub").join("b.txt"), b"original").unwrap();
        fs::write(dst.join("sub").join("b.txt"), b"tampered").unwrap();

        let err = verify_copy(&src, &dst, ChecksumAlgorithm::Sha256).expect_err("Mismatch expected");
        assert_eq!(err.kind(), ErrorKind::Verification);

        fs::write(dst.join("sub").join("b.txt"), b"original").unwrap();
        let verified = verify_copy(&src, &dst, ChecksumAlgorithm::Blake3).expect("Copies match");
        assert_eq!(verified, 2);
    }

    #[test]
    fn test_verify_reports_missing_copy() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("one.txt");
        fs::write(&src, b"data").unwrap();

        let err = verify_copy(&src, &temp_dir.path().join("absent.txt"), ChecksumAlgorithm::Md5)
            .expect_err("Missing copy should fail");
        assert_eq!(err.kind(), ErrorKind::Verification);
    }
}
