//! CLI error type and exit codes.

use std::fmt;
use std::path::PathBuf;

use packstage::logging::LoggingError;
use packstage::InstallError;

/// Exit code used when the user cancels with Ctrl+C.
pub const EXIT_CANCELLED: u8 = 130;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Bad flags or configuration.
    Config(String),
    /// The manifest file could not be read or parsed.
    Manifest { path: PathBuf, reason: String },
    /// Logging could not be initialised.
    Logging(LoggingError),
    /// Error from the installer pipeline.
    Install(InstallError),
    /// Interactive prompt failed.
    Prompt(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Install(e) if e.is_cancelled() => EXIT_CANCELLED,
            CliError::Config(_) | CliError::Manifest { .. } => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Manifest { path, reason } => {
                write!(f, "Invalid manifest {}: {}", path.display(), reason)
            }
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Install(e) if e.is_cancelled() => write!(f, "Installation cancelled"),
            CliError::Install(e) => write!(f, "Installation failed: {}", e),
            CliError::Prompt(msg) => write!(f, "Prompt failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Install(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InstallError> for CliError {
    fn from(e: InstallError) -> Self {
        CliError::Install(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_exit_code() {
        let err = CliError::from(InstallError::Cancelled);
        assert_eq!(err.exit_code(), EXIT_CANCELLED);
        assert_eq!(err.to_string(), "Installation cancelled");
    }

    #[test]
    fn test_failure_exit_codes() {
        assert_eq!(CliError::Config("x".to_string()).exit_code(), 2);
        assert_eq!(
            CliError::from(InstallError::InstallPathMissing).exit_code(),
            1
        );
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let err = CliError::from(InstallError::NoPacksInManifest);
        assert!(err.source().is_some());
        assert!(CliError::Config("x".to_string()).source().is_none());
    }
}
