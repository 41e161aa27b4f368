//! Staging files: `<final>.tmp` siblings of published packs.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::manager::error::{InstallError, InstallerResult};
use crate::manager::pack::{PackDescriptor, STAGING_SUFFIX};

/// The staging file of a pack and the final path it is published to.
///
/// A staging file exists only while a download is in progress or was
/// interrupted. It is renamed to the final path on publish and deleted on
/// checksum failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingFile {
    file_name: String,
    staging_path: PathBuf,
    final_path: PathBuf,
}

impl StagingFile {
    /// Staging file for `pack` inside `downloads_dir`.
    pub fn for_pack(pack: &PackDescriptor, downloads_dir: &Path) -> InstallerResult<Self> {
        let file_name = pack.file_name()?;
        Ok(Self::new(downloads_dir, file_name))
    }

    /// Staging file for the final artifact `file_name` inside `downloads_dir`.
    pub fn new(downloads_dir: &Path, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let staging_path = downloads_dir.join(format!("{}{}", file_name, STAGING_SUFFIX));
        let final_path = downloads_dir.join(&file_name);
        Self {
            file_name,
            staging_path,
            final_path,
        }
    }

    /// Final file name of the pack.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Path of the in-progress download.
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Path of the published pack.
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Current length of the staging file, `None` if it does not exist.
    pub async fn current_len(&self) -> InstallerResult<Option<u64>> {
        match fs::metadata(&self.staging_path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(InstallError::ReadFailed {
                path: self.staging_path.clone(),
                source: e,
            }),
        }
    }

    /// Delete the staging file. A missing file is not an error.
    pub async fn discard(&self) -> InstallerResult<()> {
        match fs::remove_file(&self.staging_path).await {
            Ok(()) => {
                debug!(file = %self.staging_path.display(), "Discarded staging file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InstallError::WriteFailed {
                path: self.staging_path.clone(),
                source: e,
            }),
        }
    }

    /// Delete the staging file, logging instead of failing.
    pub async fn discard_quietly(&self) {
        if let Err(e) = self.discard().await {
            warn!(error = %e, "Failed to remove staging file");
        }
    }

    /// Replace the final file with the verified staging file.
    ///
    /// Any stale final file is removed first, then the staging file is
    /// renamed over it.
    pub async fn publish(&self) -> InstallerResult<()> {
        match fs::remove_file(&self.final_path).await {
            Ok(()) => debug!(file = %self.final_path.display(), "Removed stale final file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(InstallError::WriteFailed {
                    path: self.final_path.clone(),
                    source: e,
                })
            }
        }

        fs::rename(&self.staging_path, &self.final_path)
            .await
            .map_err(|e| InstallError::WriteFailed {
                path: self.final_path.clone(),
                source: e,
            })
    }
}
