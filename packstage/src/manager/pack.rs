//! Pack descriptors consumed by the installer.

use percent_encoding::percent_decode_str;
use reqwest::Url;
use serde::{Deserialize, Deserializer};

use super::download::ChecksumAlgorithm;
use super::error::{InstallError, InstallerResult};

/// Suffix appended to a pack's final file name while it is being downloaded.
pub const STAGING_SUFFIX: &str = ".tmp";

/// One downloadable unit of the package.
///
/// Descriptors come from an already-parsed manifest and are never mutated.
/// A pack is identified by the file name derived from its URL path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackDescriptor {
    /// Absolute HTTP(S) URL of the pack.
    pub url: String,
    /// Expected size of the pack in bytes.
    #[serde(alias = "size")]
    pub expected_size: u64,
    /// Expected hex digest (MD5 or SHA-256). `None` skips verification.
    #[serde(
        default,
        alias = "checksum",
        alias = "md5",
        deserialize_with = "blank_as_none"
    )]
    pub expected_checksum: Option<String>,
}

/// Manifests write `""` for packs without a digest.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|digest| !digest.trim().is_empty()))
}

impl PackDescriptor {
    /// Create a new pack descriptor.
    pub fn new(url: impl Into<String>, expected_size: u64) -> Self {
        Self {
            url: url.into(),
            expected_size,
            expected_checksum: None,
        }
    }

    /// Attach an expected checksum.
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        let checksum = checksum.into();
        self.expected_checksum = if checksum.trim().is_empty() {
            None
        } else {
            Some(checksum)
        };
        self
    }

    /// The expected digest, trimmed. Blank digests count as absent.
    pub fn checksum(&self) -> Option<&str> {
        self.expected_checksum
            .as_deref()
            .map(str::trim)
            .filter(|digest| !digest.is_empty())
    }

    /// Fail with [`InstallError::UnsupportedChecksum`] unless the expected
    /// digest is absent or shaped like an MD5 or SHA-256 hex digest.
    pub fn validate_checksum(&self) -> InstallerResult<()> {
        match self.checksum() {
            Some(digest) if ChecksumAlgorithm::from_digest(digest).is_none() => {
                Err(InstallError::UnsupportedChecksum {
                    file_name: self.file_name()?,
                    digest: digest.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Derive the local file name from the last segment of the URL path.
    ///
    /// The segment is percent-decoded, so `Game%20Data.zip` is saved as
    /// `Game Data.zip`. A segment that decodes to a path separator or a dot
    /// segment is rejected.
    pub fn file_name(&self) -> InstallerResult<String> {
        let invalid = || InstallError::InvalidPackUrl {
            url: self.url.clone(),
        };

        let url = Url::parse(&self.url).map_err(|_| invalid())?;
        let segment = url
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
            .ok_or_else(invalid)?;

        let name = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| invalid())?;
        if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
            return Err(invalid());
        }
        Ok(name.into_owned())
    }
}
