//! `packstage status`: compare a manifest with what is on disk.

use std::path::PathBuf;

use indicatif::HumanBytes;
use packstage::PackInstaller;

use super::{load_config, read_manifest};
use crate::error::CliError;

pub async fn run(
    manifest: PathBuf,
    install_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref(), install_dir)?;
    let packs = read_manifest(&manifest)?;
    let installer = PackInstaller::new(config)?;

    let total = PackInstaller::total_size(&packs);
    let downloaded = installer.downloaded_size(&packs).await?;
    let percent = if total == 0 {
        100.0
    } else {
        downloaded as f64 / total as f64 * 100.0
    };

    println!("Packs:      {}", packs.len());
    println!("Total:      {}", HumanBytes(total));
    println!("Downloaded: {} ({:.1}%)", HumanBytes(downloaded), percent);
    Ok(())
}
