//! Pack installer driving a full install run.
//!
//! This module orchestrates the installation workflow:
//! 1. Resolve the install directory and plan against the files on disk
//! 2. Download, verify and publish the missing packs in parallel
//! 3. Discover the archive volumes and extract them into the install directory
//! 4. Optionally remove the downloaded archives
//!
//! Phases are reported in order `Preparing → Downloading → Installing →
//! Completed`; `Downloading` is skipped when nothing needs fetching. A failed
//! or cancelled run returns an error and never reports `Completed`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::InstallerConfig;
use super::download::{PackDownloader, RangeFetcher, ReqwestTransport, StagingFile};
use super::error::{InstallError, InstallerResult};
use super::extractor::{ArchiveExtractor, ZipFormat};
use super::pack::PackDescriptor;
use super::planner::{InstallPlan, PackPlanner};
use super::progress::{InstallCallbacks, InstallPhase, InstallProgress, ProgressReporter};
use super::traits::{ArchiveFormat, HttpTransport};

/// Result of a successful install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Directory the package was installed into.
    pub install_dir: PathBuf,
    /// Packs fetched and published during this run.
    pub packs_downloaded: usize,
    /// Size of the packs fetched during this run.
    pub bytes_downloaded: u64,
    /// Size of the packs that were already on disk.
    pub already_satisfied_bytes: u64,
    /// Uncompressed bytes written by extraction.
    pub bytes_extracted: u64,
    /// Archive entries written by extraction.
    pub entries_extracted: usize,
}

/// Installs a pack list into the configured install directory.
pub struct PackInstaller {
    config: InstallerConfig,
    transport: Arc<dyn HttpTransport>,
    extractor: ArchiveExtractor,
}

impl std::fmt::Debug for PackInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackInstaller")
            .field("config", &self.config)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

impl PackInstaller {
    /// Create an installer using reqwest for HTTP and the ZIP backend.
    pub fn new(config: InstallerConfig) -> InstallerResult<Self> {
        let transport = ReqwestTransport::new(config.connect_timeout, &config.user_agent)?;
        Ok(Self::with_components(
            config,
            Arc::new(transport),
            Arc::new(ZipFormat::new()),
        ))
    }

    /// Create an installer with explicit transport and archive backend.
    pub fn with_components(
        config: InstallerConfig,
        transport: Arc<dyn HttpTransport>,
        archive: Arc<dyn ArchiveFormat>,
    ) -> Self {
        Self {
            config,
            transport,
            extractor: ArchiveExtractor::new(archive),
        }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Run the full pipeline for `packs`.
    ///
    /// Cancelling `cancel` stops the run at the next chunk, buffered read or
    /// archive entry and returns [`InstallError::Cancelled`]. Staging files
    /// are left in place so the next run resumes them.
    pub async fn install(
        &self,
        packs: &[PackDescriptor],
        callbacks: InstallCallbacks,
        cancel: CancellationToken,
    ) -> InstallerResult<InstallReport> {
        let install_dir = self.config.resolve_install_dir()?.to_path_buf();
        if packs.is_empty() {
            return Err(InstallError::NoPacksInManifest);
        }

        let downloads_dir = self.config.downloads_dir(&install_dir);
        let plan = PackPlanner::new(&downloads_dir).plan(packs)?;
        fs::create_dir_all(&downloads_dir)
            .await
            .map_err(|e| InstallError::CreateDirFailed {
                path: downloads_dir.clone(),
                source: e,
            })?;
        info!(
            install_dir = %install_dir.display(),
            packs = packs.len(),
            to_download = plan.packs_to_download.len(),
            total_bytes = plan.total_bytes_to_download,
            satisfied_bytes = plan.already_satisfied_bytes,
            outstanding_bytes = plan.outstanding_bytes(),
            "Starting install"
        );

        let reporter = Arc::new(ProgressReporter::new(
            InstallProgress::from_plan(&plan),
            callbacks,
        ));
        reporter.report();
        reporter.enter_phase(InstallPhase::Preparing);

        let result = self
            .run_phases(&plan, &install_dir, &downloads_dir, &reporter, &cancel)
            .await;

        match &result {
            Ok(report) => info!(
                packs_downloaded = report.packs_downloaded,
                bytes_extracted = report.bytes_extracted,
                "Install complete"
            ),
            Err(e) if e.is_cancelled() => info!("Install cancelled"),
            Err(e) => warn!(error = %e, "Install failed"),
        }
        result
    }

    async fn run_phases(
        &self,
        plan: &InstallPlan,
        install_dir: &Path,
        downloads_dir: &Path,
        reporter: &Arc<ProgressReporter>,
        cancel: &CancellationToken,
    ) -> InstallerResult<InstallReport> {
        let mut report = InstallReport {
            install_dir: install_dir.to_path_buf(),
            packs_downloaded: 0,
            bytes_downloaded: 0,
            already_satisfied_bytes: plan.already_satisfied_bytes,
            bytes_extracted: 0,
            entries_extracted: 0,
        };

        if !plan.is_download_complete() {
            reporter.enter_phase(InstallPhase::Downloading);
            let downloader = PackDownloader::new(
                RangeFetcher::new(Arc::clone(&self.transport)),
                downloads_dir,
                self.config.parallel_downloads,
            );
            let summary = downloader
                .download_all(&plan.packs_to_download, reporter, cancel)
                .await?;
            report.packs_downloaded = summary.packs_downloaded;
            report.bytes_downloaded = summary.bytes_downloaded;
        } else {
            debug!("All packs present, skipping download phase");
        }

        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        reporter.enter_phase(InstallPhase::Installing);
        let extractor = self.extractor.clone();
        let source_dir = downloads_dir.to_path_buf();
        let dest_dir = install_dir.to_path_buf();
        let progress = Arc::clone(reporter);
        let token = cancel.clone();

        let summary = tokio::task::spawn_blocking(move || {
            extractor.extract(
                &source_dir,
                &dest_dir,
                &mut |extracted, total| {
                    progress.progress().set_extraction(extracted, total);
                    progress.report();
                },
                &token,
            )
        })
        .await
        .map_err(|e| InstallError::ExtractionFailure {
            path: downloads_dir.to_path_buf(),
            reason: format!("extraction task failed: {}", e),
        })??;

        report.bytes_extracted = summary.bytes_extracted;
        report.entries_extracted = summary.entries_extracted;
        reporter.progress().step_completed();
        reporter.report();

        if !self.config.keep_archives {
            remove_archives(downloads_dir).await;
        }

        reporter.enter_phase(InstallPhase::Completed);
        Ok(report)
    }

    /// Sum of the expected sizes of every pack.
    pub fn total_size(packs: &[PackDescriptor]) -> u64 {
        packs.iter().map(|p| p.expected_size).sum()
    }

    /// Bytes of `packs` already on disk.
    ///
    /// Per pack, the length of the final file if it exists, otherwise the
    /// length of its staging file, otherwise zero.
    pub async fn downloaded_size(&self, packs: &[PackDescriptor]) -> InstallerResult<u64> {
        let install_dir = self.config.resolve_install_dir()?;
        let downloads_dir = self.config.downloads_dir(install_dir);

        let mut total = 0u64;
        for pack in packs {
            let staging = StagingFile::for_pack(pack, &downloads_dir)?;
            if let Ok(meta) = fs::metadata(staging.final_path()).await {
                total += meta.len();
            } else if let Some(len) = staging.current_len().await? {
                total += len;
            }
        }
        Ok(total)
    }

    /// Remove the install directory and everything in it.
    ///
    /// A missing directory is not an error.
    pub async fn uninstall(&self) -> InstallerResult<()> {
        let install_dir = self.config.resolve_install_dir()?;
        match fs::remove_dir_all(install_dir).await {
            Ok(()) => {
                info!(install_dir = %install_dir.display(), "Uninstalled");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(install_dir = %install_dir.display(), "Nothing to uninstall");
                Ok(())
            }
            Err(e) => Err(InstallError::WriteFailed {
                path: install_dir.to_path_buf(),
                source: e,
            }),
        }
    }
}

async fn remove_archives(downloads_dir: &Path) {
    match fs::remove_dir_all(downloads_dir).await {
        Ok(()) => debug!(dir = %downloads_dir.display(), "Removed downloaded archives"),
        Err(e) => warn!(
            dir = %downloads_dir.display(),
            error = %e,
            "Failed to remove downloaded archives"
        ),
    }
}
