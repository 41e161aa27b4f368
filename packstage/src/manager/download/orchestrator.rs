//! Bounded parallel pack downloads.
//!
//! Every pack goes through the same worker steps: fetch into its staging
//! file, verify the checksum when the manifest has one, then publish. Up to
//! `parallel_downloads` workers run at once. The first failing pack aborts
//! the whole batch; the remaining workers are dropped at their next await
//! point and blocking checksum work is told to stop through a child token.

use std::io;
use std::path::PathBuf;

use futures::stream::{self, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::checksum::check_file;
use super::fetcher::{FetchOutcome, RangeFetcher};
use super::staging::StagingFile;
use crate::manager::error::{InstallError, InstallerResult};
use crate::manager::pack::PackDescriptor;
use crate::manager::progress::ProgressReporter;

/// Totals of a finished download batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Packs published during this batch.
    pub packs_downloaded: usize,
    /// Sum of the sizes of those packs.
    pub bytes_downloaded: u64,
}

/// Downloads, verifies and publishes packs into a downloads directory.
#[derive(Debug, Clone)]
pub struct PackDownloader {
    fetcher: RangeFetcher,
    downloads_dir: PathBuf,
    parallel_downloads: usize,
}

impl PackDownloader {
    /// Create a downloader. `parallel_downloads` is clamped to at least 1.
    pub fn new(
        fetcher: RangeFetcher,
        downloads_dir: impl Into<PathBuf>,
        parallel_downloads: usize,
    ) -> Self {
        Self {
            fetcher,
            downloads_dir: downloads_dir.into(),
            parallel_downloads: parallel_downloads.max(1),
        }
    }

    /// Download every pack in `packs`.
    ///
    /// Progress is reported through `reporter` per written chunk and per
    /// published pack. Returns the first fatal error of any worker.
    pub async fn download_all(
        &self,
        packs: &[PackDescriptor],
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> InstallerResult<DownloadSummary> {
        tokio::fs::create_dir_all(&self.downloads_dir)
            .await
            .map_err(|e| InstallError::CreateDirFailed {
                path: self.downloads_dir.clone(),
                source: e,
            })?;

        let workers = cancel.child_token();
        let result = stream::iter(packs.iter().map(Ok::<_, InstallError>))
            .map_ok(|pack| self.download_pack(pack, reporter, &workers))
            .try_buffer_unordered(self.parallel_downloads)
            .try_fold(DownloadSummary::default(), |mut summary, bytes| async move {
                summary.packs_downloaded += 1;
                summary.bytes_downloaded += bytes;
                Ok(summary)
            })
            .await;

        if let Err(e) = &result {
            workers.cancel();
            if !e.is_cancelled() {
                warn!(error = %e, "Pack download failed, aborting remaining downloads");
            }
        }
        result
    }

    async fn download_pack(
        &self,
        pack: &PackDescriptor,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> InstallerResult<u64> {
        let staging = StagingFile::for_pack(pack, &self.downloads_dir)?;
        info!(
            file = staging.file_name(),
            size = pack.expected_size,
            "Downloading pack"
        );

        let on_bytes = |delta: u64| {
            reporter.progress().add_downloaded(delta);
            reporter.report();
        };

        let outcome = self
            .fetcher
            .fetch(&pack.url, &staging, pack.expected_size, &on_bytes, cancel)
            .await?;
        debug!(file = staging.file_name(), ?outcome, "Fetch finished");

        if let Some(expected) = pack.checksum() {
            verify_staging(&staging, expected, cancel).await?;
        }

        staging.publish().await?;
        reporter.progress().pack_completed();
        reporter.report();

        match outcome {
            FetchOutcome::Downloaded { resumed_from } if resumed_from > 0 => info!(
                file = staging.file_name(),
                resumed_from,
                "Pack published after resume"
            ),
            _ => info!(file = staging.file_name(), "Pack published"),
        }

        Ok(pack.expected_size)
    }
}

/// Hash the staging file off the async runtime and compare.
///
/// A mismatching staging file is deleted so the next run downloads it again.
async fn verify_staging(
    staging: &StagingFile,
    expected: &str,
    cancel: &CancellationToken,
) -> InstallerResult<()> {
    let path = staging.staging_path().to_path_buf();
    let file_name = staging.file_name().to_string();
    let expected_owned = expected.to_string();
    let token = cancel.clone();

    let verdict = tokio::task::spawn_blocking(move || {
        check_file(&path, &file_name, &expected_owned, Some(&token))
    })
    .await
    .map_err(|e| InstallError::ReadFailed {
        path: staging.staging_path().to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, e),
    })??;

    match verdict {
        None => {
            debug!(file = staging.file_name(), "Checksum verified");
            Ok(())
        }
        Some(actual) => {
            staging.discard_quietly().await;
            Err(InstallError::ChecksumMismatch {
                file_name: staging.file_name().to_string(),
                expected: expected.to_string(),
                actual,
            })
        }
    }
}
