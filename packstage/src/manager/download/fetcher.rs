//! Resumable single-file fetcher.
//!
//! The fetcher streams one pack into its staging file. Before touching the
//! network it inspects the staging file:
//!
//! | staging length        | action                                   |
//! |-----------------------|------------------------------------------|
//! | missing or 0          | plain GET, create/truncate               |
//! | 0 < len < expected    | GET with `Range: bytes=len-`, append     |
//! | len == expected       | no request, report all bytes             |
//! | len > expected        | delete, plain GET                        |
//!
//! A range request answered with anything but `206 Partial Content` means the
//! server ignored the range; the local bytes are discarded and the response
//! body is written from offset zero instead.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::staging::StagingFile;
use crate::manager::error::{InstallError, InstallerResult};
use crate::manager::traits::HttpTransport;

/// How a fetch reached its end state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The staging file was already complete; no request was made.
    AlreadyComplete,
    /// The body was streamed, starting at `resumed_from`.
    Downloaded { resumed_from: u64 },
}

/// Streams packs into staging files with resume support.
#[derive(Clone)]
pub struct RangeFetcher {
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for RangeFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeFetcher").finish_non_exhaustive()
    }
}

impl RangeFetcher {
    /// Create a fetcher over the given transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Fetch `url` into `staging` until it holds exactly `expected_size` bytes.
    ///
    /// `on_bytes_written` receives byte deltas: the resumed prefix once the
    /// server confirms the range, then every chunk as it is written.
    pub async fn fetch(
        &self,
        url: &str,
        staging: &StagingFile,
        expected_size: u64,
        on_bytes_written: &(dyn Fn(u64) + Send + Sync),
        cancel: &CancellationToken,
    ) -> InstallerResult<FetchOutcome> {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        let mut existing = staging.current_len().await?.unwrap_or(0);

        if existing > expected_size {
            warn!(
                file = staging.file_name(),
                existing,
                expected_size,
                "Staging file larger than expected, restarting"
            );
            staging.discard().await?;
            existing = 0;
        }

        if existing == expected_size && staging.staging_path().exists() {
            debug!(file = staging.file_name(), "Staging file already complete");
            on_bytes_written(existing);
            return Ok(FetchOutcome::AlreadyComplete);
        }

        let range_start = (existing > 0).then_some(existing);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(InstallError::Cancelled),
            response = self.transport.get(url, range_start) => response?,
        };

        if existing > 0 {
            if response.is_partial_content() {
                info!(file = staging.file_name(), offset = existing, "Resuming download");
                on_bytes_written(existing);
            } else {
                warn!(
                    file = staging.file_name(),
                    status = response.status,
                    "Server ignored range request, restarting from zero"
                );
                staging.discard().await?;
                existing = 0;
            }
        }

        if !response.is_success() {
            return Err(InstallError::HttpFailure {
                url: url.to_string(),
                status: response.status,
            });
        }

        let file = open_staging(staging.staging_path(), existing > 0).await?;
        self.stream_body(response.body, file, staging, on_bytes_written, cancel)
            .await?;

        let actual = staging.current_len().await?.unwrap_or(0);
        if actual != expected_size {
            return Err(InstallError::DownloadIncomplete {
                file_name: staging.file_name().to_string(),
                expected: expected_size,
                actual,
            });
        }

        Ok(FetchOutcome::Downloaded {
            resumed_from: existing,
        })
    }

    async fn stream_body(
        &self,
        mut body: crate::manager::traits::ByteStream,
        mut file: File,
        staging: &StagingFile,
        on_bytes_written: &(dyn Fn(u64) + Send + Sync),
        cancel: &CancellationToken,
    ) -> InstallerResult<()> {
        let write_err = |e| InstallError::WriteFailed {
            path: staging.staging_path().to_path_buf(),
            source: e,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = body.next() => Some(chunk),
            };

            let chunk = match next {
                // Cancelled: keep what was written so the next run can resume.
                None => {
                    file.flush().await.map_err(write_err)?;
                    return Err(InstallError::Cancelled);
                }
                Some(None) => break,
                Some(Some(chunk)) => chunk?,
            };

            if chunk.is_empty() {
                continue;
            }

            file.write_all(&chunk).await.map_err(write_err)?;
            on_bytes_written(chunk.len() as u64);
        }

        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)
    }
}

async fn open_staging(path: &Path, append: bool) -> InstallerResult<File> {
    let mut options = OpenOptions::new();
    if append {
        options.append(true);
    } else {
        options.write(true).create(true).truncate(true);
    }

    options
        .open(path)
        .await
        .map_err(|e| InstallError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
