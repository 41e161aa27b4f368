//! CLI subcommands.
//!
//! Each command resolves an [`InstallerConfig`] from the config file and its
//! flags (flags win), then drives the library.

pub mod install;
pub mod status;
pub mod uninstall;

use std::fs;
use std::path::{Path, PathBuf};

use packstage::{InstallerConfig, PackDescriptor};

use crate::error::CliError;

/// Load the config file, explicit or default, and apply the install dir flag.
pub fn load_config(
    config_path: Option<&Path>,
    install_dir: Option<PathBuf>,
) -> Result<InstallerConfig, CliError> {
    let config = match config_path {
        Some(path) => InstallerConfig::from_ini_file(path),
        None => InstallerConfig::load(),
    }
    .map_err(|e| CliError::Config(e.to_string()))?;

    let config = match install_dir {
        Some(dir) => config.with_install_dir(dir),
        None => config,
    };

    if config.install_dir.is_none() {
        return Err(CliError::Config(
            "No install directory specified. Use --install-dir or set install_dir in config.ini [installer] section."
                .to_string(),
        ));
    }
    Ok(config)
}

/// Read a JSON manifest: an array of `{url, size, checksum?}` objects.
pub fn read_manifest(path: &Path) -> Result<Vec<PackDescriptor>, CliError> {
    let manifest_err = |reason: String| CliError::Manifest {
        path: path.to_path_buf(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| manifest_err(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| manifest_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_manifest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        fs::write(
            &path,
            r#"[
                {"url": "https://cdn.example.com/Game.zip.001", "size": 1000, "checksum": "5eb63bbbe01eeed093cb22bb8f5acdc3"},
                {"url": "https://cdn.example.com/Game.zip.002", "size": 500}
            ]"#,
        )
        .unwrap();

        let packs = read_manifest(&path).unwrap();

        assert_eq!(packs.len(), 2);
        assert_eq!(packs[0].expected_size, 1000);
        assert!(packs[1].expected_checksum.is_none());
    }

    #[test]
    fn test_read_manifest_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            read_manifest(&path),
            Err(CliError::Manifest { .. })
        ));
    }

    #[test]
    fn test_install_dir_flag_overrides_config() {
        let temp = TempDir::new().unwrap();
        let ini = temp.path().join("config.ini");
        fs::write(&ini, "[installer]\ninstall_dir = /from/config\n").unwrap();

        let config = load_config(Some(&ini), Some(PathBuf::from("/from/flag"))).unwrap();
        assert_eq!(config.install_dir, Some(PathBuf::from("/from/flag")));

        let config = load_config(Some(&ini), None).unwrap();
        assert_eq!(config.install_dir, Some(PathBuf::from("/from/config")));
    }
}
