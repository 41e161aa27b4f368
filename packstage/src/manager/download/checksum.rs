//! Pack checksum calculation and verification.
//!
//! Manifests carry MD5 digests; SHA-256 is accepted as well. The algorithm is
//! chosen from the length of the expected hex digest, and comparison is
//! case-insensitive.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::manager::error::{InstallError, InstallerResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Digest algorithms a manifest checksum can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Pick the algorithm matching a hex digest, by length.
    pub fn from_digest(digest: &str) -> Option<Self> {
        if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match digest.len() {
            32 => Some(Self::Md5),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Calculate the lowercase hex digest of a file.
///
/// `cancel` is checked before every buffered read.
pub fn calculate_file_checksum(
    path: &Path,
    algorithm: ChecksumAlgorithm,
    cancel: Option<&CancellationToken>,
) -> InstallerResult<String> {
    match algorithm {
        ChecksumAlgorithm::Md5 => hash_file::<Md5>(path, cancel),
        ChecksumAlgorithm::Sha256 => hash_file::<Sha256>(path, cancel),
    }
}

fn hash_file<D: Digest>(path: &Path, cancel: Option<&CancellationToken>) -> InstallerResult<String> {
    let mut file = File::open(path).map_err(|e| InstallError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(InstallError::Cancelled);
        }

        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| InstallError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Check the file at `path` against an expected hex digest.
///
/// Returns `Ok(None)` on a match and the actual digest on mismatch. An
/// expected digest that is neither MD5 nor SHA-256 shaped is an
/// [`InstallError::UnsupportedChecksum`] naming `file_name`.
pub fn check_file(
    path: &Path,
    file_name: &str,
    expected: &str,
    cancel: Option<&CancellationToken>,
) -> InstallerResult<Option<String>> {
    let expected = expected.trim();
    let algorithm =
        ChecksumAlgorithm::from_digest(expected).ok_or_else(|| InstallError::UnsupportedChecksum {
            file_name: file_name.to_string(),
            digest: expected.to_string(),
        })?;

    let actual = calculate_file_checksum(path, algorithm, cancel)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(None)
    } else {
        Ok(Some(actual))
    }
}
