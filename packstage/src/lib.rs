//! Packstage - resumable multi-pack downloader and installer
//!
//! This library downloads a package published as several packs (often the
//! volumes of one split archive), resumes interrupted transfers with HTTP
//! range requests, verifies each pack against its manifest checksum and
//! extracts the result into an install directory, reporting phase and byte
//! progress along the way.

pub mod logging;
pub mod manager;

pub use manager::{
    InstallCallbacks, InstallError, InstallPhase, InstallReport, InstallerConfig,
    InstallerResult, PackDescriptor, PackInstaller, ProgressSnapshot,
};
