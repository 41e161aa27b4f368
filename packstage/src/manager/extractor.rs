//! Archive extraction for package installation.
//!
//! This module handles:
//! - Locating the archive volumes in the downloads directory
//! - Stitching split volumes into one stream for the archive backend
//! - Translating backend progress into `(extracted, total)` byte pairs
//!
//! The archive format itself sits behind [`ArchiveFormat`]; [`ZipFormat`] is
//! the shipped backend.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use super::error::{InstallError, InstallerResult};
use super::traits::{ArchiveEntry, ArchiveFormat, ReadSeek};
use super::volume::VolumeSet;

/// Buffer size for streaming entry data (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// ZIP backend built on the `zip` crate.
///
/// Entries whose names would escape the destination directory are skipped.
/// Unix permissions stored in the archive are restored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipFormat;

impl ZipFormat {
    pub fn new() -> Self {
        Self
    }
}

fn zip_failure(e: ZipError) -> InstallError {
    // Path filled in by ArchiveExtractor, which knows the volume name.
    InstallError::ExtractionFailure {
        path: PathBuf::new(),
        reason: e.to_string(),
    }
}

impl ArchiveFormat for ZipFormat {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn list_entries(&self, source: &mut dyn ReadSeek) -> InstallerResult<Vec<ArchiveEntry>> {
        let mut archive = ZipArchive::new(source).map_err(zip_failure)?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index(i).map_err(zip_failure)?;
            entries.push(ArchiveEntry {
                name: file.name().to_string(),
                size: file.size(),
                is_dir: file.is_dir(),
            });
        }

        Ok(entries)
    }

    fn extract_all(
        &self,
        source: &mut dyn ReadSeek,
        dest_dir: &Path,
        on_progress: &mut dyn FnMut(u64),
        cancel: &CancellationToken,
    ) -> InstallerResult<usize> {
        let mut archive = ZipArchive::new(source).map_err(zip_failure)?;
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut extracted_bytes = 0u64;
        let mut extracted_entries = 0usize;

        for i in 0..archive.len() {
            if cancel.is_cancelled() {
                return Err(InstallError::Cancelled);
            }

            let mut file = archive.by_index(i).map_err(zip_failure)?;
            let Some(relative) = file.enclosed_name() else {
                warn!(entry = file.name(), "Skipping archive entry with unsafe path");
                continue;
            };
            let outpath = dest_dir.join(relative);

            if file.is_dir() {
                create_dir(&outpath)?;
            } else {
                if let Some(parent) = outpath.parent() {
                    create_dir(parent)?;
                }

                let write_err = |e| InstallError::WriteFailed {
                    path: outpath.clone(),
                    source: e,
                };
                let mut outfile = create_output(&outpath).map_err(write_err)?;

                loop {
                    if cancel.is_cancelled() {
                        return Err(InstallError::Cancelled);
                    }
                    let n = file
                        .read(&mut buffer)
                        .map_err(|e| InstallError::ExtractionFailure {
                            path: PathBuf::new(),
                            reason: format!("failed to read entry {}: {}", file.name(), e),
                        })?;
                    if n == 0 {
                        break;
                    }
                    outfile.write_all(&buffer[..n]).map_err(write_err)?;
                    extracted_bytes += n as u64;
                    on_progress(extracted_bytes);
                }
                outfile.flush().map_err(write_err)?;
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    fs::set_permissions(&outpath, fs::Permissions::from_mode(mode)).map_err(
                        |e| InstallError::WriteFailed {
                            path: outpath.clone(),
                            source: e,
                        },
                    )?;
                }
            }

            extracted_entries += 1;
        }

        Ok(extracted_entries)
    }
}

/// Create or truncate an output file.
///
/// A file left read-only by an earlier extraction is replaced rather than
/// opened for writing.
fn create_output(path: &Path) -> io::Result<File> {
    match File::create(path) {
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && path.is_file() => {
            fs::remove_file(path)?;
            File::create(path)
        }
        other => other,
    }
}

fn create_dir(path: &Path) -> InstallerResult<()> {
    fs::create_dir_all(path).map_err(|e| InstallError::CreateDirFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Result of extracting an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// First volume of the extracted archive.
    pub archive: PathBuf,
    /// Number of volumes read.
    pub volume_count: usize,
    /// Entries written, directories included.
    pub entries_extracted: usize,
    /// Uncompressed bytes written.
    pub bytes_extracted: u64,
    /// Uncompressed size announced by the archive's entry table.
    pub total_bytes: u64,
}

/// Extracts the archive found in a downloads directory.
///
/// Runs synchronously; callers on an async runtime wrap it in
/// `spawn_blocking`.
#[derive(Clone)]
pub struct ArchiveExtractor {
    format: Arc<dyn ArchiveFormat>,
}

impl std::fmt::Debug for ArchiveExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveExtractor")
            .field("format", &self.format.name())
            .finish()
    }
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(Arc::new(ZipFormat::new()))
    }
}

impl ArchiveExtractor {
    /// Create an extractor over the given archive backend.
    pub fn new(format: Arc<dyn ArchiveFormat>) -> Self {
        Self { format }
    }

    /// Discover the archive in `source_dir` and extract it into `dest_dir`.
    ///
    /// `on_progress` receives `(extracted_bytes, total_bytes)`. Extracted
    /// bytes never decrease between calls, and a final call is made once
    /// every entry has been written.
    pub fn extract(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        on_progress: &mut dyn FnMut(u64, u64),
        cancel: &CancellationToken,
    ) -> InstallerResult<ExtractionSummary> {
        let volumes = VolumeSet::discover(source_dir)?;
        let archive = volumes
            .first()
            .map(Path::to_path_buf)
            .ok_or_else(|| InstallError::ArchiveNotFound {
                dir: source_dir.to_path_buf(),
            })?;
        info!(
            archive = %archive.display(),
            volumes = volumes.volumes().len(),
            format = self.format.name(),
            "Extracting archive"
        );

        let attach_path = |e: InstallError| match e {
            InstallError::ExtractionFailure { path, reason } if path.as_os_str().is_empty() => {
                InstallError::ExtractionFailure {
                    path: archive.clone(),
                    reason,
                }
            }
            other => other,
        };

        let mut reader = volumes.open()?;
        if reader.is_empty() {
            return Err(InstallError::ExtractionFailure {
                path: archive.clone(),
                reason: "archive is empty".to_string(),
            });
        }
        debug!(
            bytes = reader.len(),
            volumes = reader.volume_count(),
            split = volumes.is_split(),
            "Opened archive stream"
        );

        let total_bytes: u64 = self
            .format
            .list_entries(&mut reader)
            .map_err(attach_path)?
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.size)
            .sum();
        debug!(total_bytes, "Archive size from entry table");

        create_dir(dest_dir)?;

        // Fresh reader so the backend starts from a clean stream position.
        let mut reader = volumes.open()?;
        let mut reported = 0u64;
        on_progress(0, total_bytes);
        let mut forward = |extracted: u64| {
            if extracted > reported {
                reported = extracted;
                on_progress(extracted, total_bytes);
            }
        };

        let entries_extracted = self
            .format
            .extract_all(&mut reader, dest_dir, &mut forward, cancel)
            .map_err(attach_path)?;

        on_progress(reported, total_bytes);
        info!(
            entries = entries_extracted,
            bytes = reported,
            "Extraction complete"
        );

        Ok(ExtractionSummary {
            archive,
            volume_count: volumes.volumes().len(),
            entries_extracted,
            bytes_extracted: reported,
            total_bytes,
        })
    }
}
