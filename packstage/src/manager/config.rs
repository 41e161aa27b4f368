//! Configuration for the pack installer.
//!
//! Settings can be built in code with the builder methods or loaded from an
//! INI file with an `[installer]` section:
//!
//! ```ini
//! [installer]
//! install_dir = /games/endfield
//! parallel_downloads = 4
//! connect_timeout_secs = 30
//! keep_archives = true
//! user_agent = packstage/0.3
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use super::error::{InstallError, InstallerResult};

/// Name of the working directory holding staged and published packs.
pub const DEFAULT_DOWNLOADS_DIR: &str = "Downloads";

/// Default number of packs downloaded concurrently.
pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 4;

/// Default connect timeout for HTTP requests in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

const INI_SECTION: &str = "installer";

/// Configuration for a [`PackInstaller`](super::PackInstaller).
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Directory the package is installed into.
    ///
    /// `None` makes every install run fail with `InstallPathMissing`.
    pub install_dir: Option<PathBuf>,

    /// Name of the downloads directory under `install_dir`.
    pub downloads_dir_name: String,

    /// Maximum concurrent pack downloads. Fixed for the duration of a run.
    pub parallel_downloads: usize,

    /// HTTP connect timeout.
    pub connect_timeout: Duration,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Whether to keep downloaded archive parts after extraction.
    pub keep_archives: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            downloads_dir_name: DEFAULT_DOWNLOADS_DIR.to_string(),
            parallel_downloads: DEFAULT_PARALLEL_DOWNLOADS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: concat!("packstage/", env!("CARGO_PKG_VERSION")).to_string(),
            keep_archives: true,
        }
    }
}

impl InstallerConfig {
    /// Create a new configuration with the given install directory.
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: Some(install_dir.into()),
            ..Default::default()
        }
    }

    /// Set the install directory.
    pub fn with_install_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(path.into());
        self
    }

    /// Set the maximum concurrent downloads (minimum 1).
    pub fn with_parallel_downloads(mut self, count: usize) -> Self {
        self.parallel_downloads = count.max(1);
        self
    }

    /// Set the HTTP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable keeping downloaded archives.
    pub fn with_keep_archives(mut self, keep: bool) -> Self {
        self.keep_archives = keep;
        self
    }

    /// Resolve the install directory, failing if it is unset or empty.
    pub fn resolve_install_dir(&self) -> InstallerResult<&Path> {
        match self.install_dir.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => Ok(path),
            _ => Err(InstallError::InstallPathMissing),
        }
    }

    /// Path of the downloads directory for the given install directory.
    pub fn downloads_dir(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(&self.downloads_dir_name)
    }

    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("packstage").join("config.ini"))
    }

    /// Load the configuration from the default location.
    ///
    /// Returns the defaults when no configuration file exists.
    pub fn load() -> InstallerResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_ini_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load the configuration from an INI file.
    pub fn from_ini_file(path: &Path) -> InstallerResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| {
            InstallError::InvalidConfig(format!("cannot load {}: {}", path.display(), e))
        })?;
        Self::from_ini(&ini)
    }

    /// Build a configuration from parsed INI content.
    pub fn from_ini(ini: &Ini) -> InstallerResult<Self> {
        let mut config = Self::default();

        let Some(section) = ini.section(Some(INI_SECTION)) else {
            return Ok(config);
        };

        if let Some(dir) = section.get("install_dir").filter(|v| !v.trim().is_empty()) {
            config.install_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(name) = section.get("downloads_dir").filter(|v| !v.trim().is_empty()) {
            config.downloads_dir_name = name.trim().to_string();
        }
        if let Some(value) = section.get("parallel_downloads") {
            let count = parse_value::<usize>("parallel_downloads", value)?;
            config.parallel_downloads = count.max(1);
        }
        if let Some(value) = section.get("connect_timeout_secs") {
            let secs = parse_value::<u64>("connect_timeout_secs", value)?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = section.get("user_agent") {
            config.user_agent = value.trim().to_string();
        }
        if let Some(value) = section.get("keep_archives") {
            config.keep_archives = parse_value::<bool>("keep_archives", value)?;
        }

        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> InstallerResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| InstallError::InvalidConfig(format!("invalid value for {}: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InstallerConfig::default();
        assert!(config.install_dir.is_none());
        assert_eq!(config.downloads_dir_name, "Downloads");
        assert_eq!(config.parallel_downloads, 4);
        assert!(config.keep_archives);
    }

    #[test]
    fn test_builder_pattern() {
        let config = InstallerConfig::new("/games/endfield")
            .with_parallel_downloads(8)
            .with_connect_timeout(Duration::from_secs(5))
            .with_keep_archives(false);

        assert_eq!(config.install_dir, Some(PathBuf::from("/games/endfield")));
        assert_eq!(config.parallel_downloads, 8);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(!config.keep_archives);
    }

    #[test]
    fn test_min_parallel_downloads() {
        let config = InstallerConfig::default().with_parallel_downloads(0);
        assert_eq!(config.parallel_downloads, 1);
    }

    #[test]
    fn test_resolve_install_dir_missing() {
        let config = InstallerConfig::default();
        assert!(matches!(
            config.resolve_install_dir(),
            Err(InstallError::InstallPathMissing)
        ));

        let config = InstallerConfig::default().with_install_dir("");
        assert!(matches!(
            config.resolve_install_dir(),
            Err(InstallError::InstallPathMissing)
        ));
    }

    #[test]
    fn test_downloads_dir() {
        let config = InstallerConfig::new("/games/endfield");
        let install_dir = config.resolve_install_dir().unwrap();
        assert_eq!(
            config.downloads_dir(install_dir),
            PathBuf::from("/games/endfield/Downloads")
        );
    }

    #[test]
    fn test_from_ini() {
        let ini = Ini::load_from_str(
            "[installer]\n\
             install_dir = /srv/game\n\
             parallel_downloads = 2\n\
             connect_timeout_secs = 12\n\
             keep_archives = false\n\
             unknown = ignored\n",
        )
        .unwrap();

        let config = InstallerConfig::from_ini(&ini).unwrap();
        assert_eq!(config.install_dir, Some(PathBuf::from("/srv/game")));
        assert_eq!(config.parallel_downloads, 2);
        assert_eq!(config.connect_timeout, Duration::from_secs(12));
        assert!(!config.keep_archives);
    }

    #[test]
    fn test_from_ini_without_section() {
        let ini = Ini::load_from_str("[other]\nkey = value\n").unwrap();
        let config = InstallerConfig::from_ini(&ini).unwrap();
        assert_eq!(config.parallel_downloads, DEFAULT_PARALLEL_DOWNLOADS);
    }

    #[test]
    fn test_from_ini_invalid_value() {
        let ini = Ini::load_from_str("[installer]\nparallel_downloads = many\n").unwrap();
        let result = InstallerConfig::from_ini(&ini);
        assert!(matches!(result, Err(InstallError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_ini_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[installer]\nkeep_archives = false\n").unwrap();

        let config = InstallerConfig::from_ini_file(&path).unwrap();
        assert!(!config.keep_archives);
    }
}
