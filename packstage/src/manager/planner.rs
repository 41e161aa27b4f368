//! Pack planning: diff the manifest against what is already on disk.
//!
//! A pack whose final file already exists with exactly the expected size is
//! considered satisfied and is not downloaded again. A final file of any other
//! size is not repaired in place; the pack is simply scheduled for download.
//! Partially downloaded staging files are left for the fetcher to resume.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::InstallerResult;
use super::pack::PackDescriptor;

/// Result of planning an install run.
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    /// Packs that still need to be downloaded, in manifest order.
    pub packs_to_download: Vec<PackDescriptor>,
    /// Sum of the expected sizes of every pack in the manifest.
    pub total_bytes_to_download: u64,
    /// Bytes already present as complete final files.
    pub already_satisfied_bytes: u64,
    /// Number of discrete steps: one per pack to download plus extraction.
    pub total_steps: usize,
}

impl InstallPlan {
    /// Bytes that still need to be fetched.
    pub fn outstanding_bytes(&self) -> u64 {
        self.total_bytes_to_download
            .saturating_sub(self.already_satisfied_bytes)
    }

    /// Whether the download phase has nothing to do.
    pub fn is_download_complete(&self) -> bool {
        self.packs_to_download.is_empty()
    }
}

/// Builds [`InstallPlan`]s for a downloads directory.
#[derive(Debug, Clone)]
pub struct PackPlanner {
    downloads_dir: PathBuf,
}

impl PackPlanner {
    /// Create a planner for the given downloads directory.
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Diff the pack list against the final files present on disk.
    ///
    /// Every pack's URL and digest are validated first, so a malformed
    /// manifest fails before any byte is fetched.
    pub fn plan(&self, packs: &[PackDescriptor]) -> InstallerResult<InstallPlan> {
        let mut packs_to_download = Vec::new();
        let mut total_bytes_to_download = 0u64;
        let mut already_satisfied_bytes = 0u64;

        for pack in packs {
            pack.validate_checksum()?;
        }

        for pack in packs {
            total_bytes_to_download += pack.expected_size;

            let final_path = self.downloads_dir.join(pack.file_name()?);
            match final_file_len(&final_path) {
                Some(len) if len == pack.expected_size => {
                    debug!(file = %final_path.display(), bytes = len, "Pack already present");
                    already_satisfied_bytes += len;
                }
                Some(len) => {
                    debug!(
                        file = %final_path.display(),
                        actual = len,
                        expected = pack.expected_size,
                        "Pack present with wrong size, scheduling download"
                    );
                    packs_to_download.push(pack.clone());
                }
                None => packs_to_download.push(pack.clone()),
            }
        }

        let total_steps = packs_to_download.len() + 1;

        Ok(InstallPlan {
            packs_to_download,
            total_bytes_to_download,
            already_satisfied_bytes,
            total_steps,
        })
    }
}

fn final_file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}
