//! `packstage install`: download and extract a manifest.

use std::path::PathBuf;

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use packstage::{InstallCallbacks, InstallPhase, PackInstaller};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{load_config, read_manifest};
use crate::error::CliError;

/// Resolved arguments of the install command.
#[derive(Debug)]
pub struct InstallArgs {
    pub manifest: PathBuf,
    pub install_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub parallel: Option<usize>,
    pub keep_archives: Option<bool>,
}

pub async fn run(args: InstallArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref(), args.install_dir)?;
    if let Some(parallel) = args.parallel {
        config = config.with_parallel_downloads(parallel);
    }
    if let Some(keep) = args.keep_archives {
        config = config.with_keep_archives(keep);
    }

    let packs = read_manifest(&args.manifest)?;
    let installer = PackInstaller::new(config)?;

    println!(
        "Installing {} packs ({}) into {}",
        packs.len(),
        HumanBytes(PackInstaller::total_size(&packs)),
        installer
            .config()
            .install_dir
            .as_deref()
            .unwrap_or_else(|| std::path::Path::new("."))
            .display()
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, cancelling (partial downloads are kept)...");
        on_signal.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {msg}")
            .map_err(|e| CliError::Config(e.to_string()))?
            .progress_chars("=>-"),
    );

    let progress_bar = bar.clone();
    let phase_bar = bar.clone();
    let callbacks = InstallCallbacks::new()
        .on_progress(move |snapshot| {
            progress_bar.set_length(snapshot.total_bytes_to_download);
            progress_bar.set_position(snapshot.downloaded_bytes);
        })
        .on_phase(move |phase| {
            let message = match phase {
                InstallPhase::Downloading => "Downloading packs",
                InstallPhase::Installing => "Extracting archive",
                other => other.name(),
            };
            phase_bar.set_message(message);
        });

    let result = installer.install(&packs, callbacks, cancel).await;
    match &result {
        Ok(_) => bar.finish_with_message("Done"),
        Err(_) => bar.abandon(),
    }
    let report = result?;

    info!(install_dir = %report.install_dir.display(), "Install finished");
    println!();
    println!("Installed to {}", report.install_dir.display());
    println!(
        "  Downloaded: {} packs ({})",
        report.packs_downloaded,
        HumanBytes(report.bytes_downloaded)
    );
    println!(
        "  Reused:     {}",
        HumanBytes(report.already_satisfied_bytes)
    );
    println!(
        "  Extracted:  {} entries ({})",
        report.entries_extracted,
        HumanBytes(report.bytes_extracted)
    );
    Ok(())
}
