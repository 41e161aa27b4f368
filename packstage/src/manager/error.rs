//! Error types for the pack installer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for installer operations.
pub type InstallerResult<T> = Result<T, InstallError>;

/// Errors that can occur while planning, downloading or extracting packs.
#[derive(Debug, Error)]
pub enum InstallError {
    /// No install directory was configured.
    #[error("install path is missing")]
    InstallPathMissing,

    /// The manifest handed to the installer contained no packs.
    #[error("no download packs found in manifest")]
    NoPacksInManifest,

    /// A pack URL has no file name in its path.
    #[error("cannot derive a file name from pack url {url}")]
    InvalidPackUrl { url: String },

    /// Network or transport failure while talking to the server.
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpFailure { url: String, status: u16 },

    /// The staging file does not have the expected size after the transfer.
    #[error("download incomplete for {file_name}: expected {expected} bytes, got {actual}")]
    DownloadIncomplete {
        file_name: String,
        expected: u64,
        actual: u64,
    },

    /// The staging file content does not match the manifest digest.
    #[error("checksum mismatch for {file_name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file_name: String,
        expected: String,
        actual: String,
    },

    /// The manifest digest is neither MD5 nor SHA-256 shaped.
    #[error("unsupported checksum for {file_name}: {digest}")]
    UnsupportedChecksum { file_name: String, digest: String },

    /// No archive volume could be found in the downloads directory.
    #[error("no archive found in {}", dir.display())]
    ArchiveNotFound { dir: PathBuf },

    /// The archive backend failed to read or extract the archive.
    #[error("failed to extract {}: {reason}", path.display())]
    ExtractionFailure { path: PathBuf, reason: String },

    /// The run was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl InstallError {
    /// Whether this error is the cancellation outcome rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let err = InstallError::ChecksumMismatch {
            file_name: "game.zip.001".to_string(),
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(err.to_string().contains("game.zip.001"));
        assert!(err.to_string().contains("abc123"));
        assert!(err.to_string().contains("def456"));
    }

    #[test]
    fn test_download_incomplete_display() {
        let err = InstallError::DownloadIncomplete {
            file_name: "a.bin".to_string(),
            expected: 1000,
            actual: 999,
        };
        assert_eq!(
            err.to_string(),
            "download incomplete for a.bin: expected 1000 bytes, got 999"
        );
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err = InstallError::ReadFailed {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
        assert!(InstallError::Cancelled.source().is_none());
    }

    #[test]
    fn test_is_cancelled() {
        assert!(InstallError::Cancelled.is_cancelled());
        assert!(!InstallError::InstallPathMissing.is_cancelled());
    }
}
