//! `packstage uninstall`: remove the install directory.

use std::path::PathBuf;

use dialoguer::Confirm;
use packstage::PackInstaller;

use super::load_config;
use crate::error::CliError;

pub async fn run(
    install_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    force: bool,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref(), install_dir)?;
    let installer = PackInstaller::new(config)?;
    let target = installer.config().resolve_install_dir()?.to_path_buf();

    if !target.exists() {
        println!("Nothing installed at {}", target.display());
        return Ok(());
    }

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {} and everything in it?", target.display()))
            .default(false)
            .interact()
            .map_err(|e| CliError::Prompt(e.to_string()))?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    installer.uninstall().await?;
    println!("Removed {}", target.display());
    Ok(())
}
