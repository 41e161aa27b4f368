//! Multi-pack download and install pipeline.
//!
//! An install run takes an already-parsed list of [`PackDescriptor`]s and an
//! install directory, then:
//!
//! 1. plans which packs are missing ([`PackPlanner`])
//! 2. downloads them in parallel with resume support ([`download`])
//! 3. verifies and publishes each pack from its `.tmp` staging file
//! 4. extracts the (possibly split) archive ([`ArchiveExtractor`])
//!
//! ```text
//! <install_dir>/
//! ├── Downloads/
//! │   ├── Game.zip.001        published pack
//! │   └── Game.zip.002.tmp    staging file, resumable
//! └── ...                     extracted archive entries
//! ```
//!
//! # Example
//!
//! ```ignore
//! use packstage::manager::{InstallCallbacks, InstallerConfig, PackDescriptor, PackInstaller};
//! use tokio_util::sync::CancellationToken;
//!
//! let installer = PackInstaller::new(InstallerConfig::new("/games/endfield"))?;
//! let packs = vec![PackDescriptor::new("https://cdn.example.com/Game.zip.001", 1_048_576)
//!     .with_checksum("5eb63bbbe01eeed093cb22bb8f5acdc3")];
//!
//! let callbacks = InstallCallbacks::new()
//!     .on_phase(|phase| println!("{}", phase))
//!     .on_progress(|p| println!("{}/{}", p.downloaded_bytes, p.total_bytes_to_download));
//!
//! let report = installer.install(&packs, callbacks, CancellationToken::new()).await?;
//! ```

mod config;
pub mod download;
mod error;
mod extractor;
mod installer;
mod pack;
mod planner;
mod progress;
mod traits;
mod volume;

pub use config::{InstallerConfig, DEFAULT_DOWNLOADS_DIR, DEFAULT_PARALLEL_DOWNLOADS};
pub use error::{InstallError, InstallerResult};
pub use extractor::{ArchiveExtractor, ExtractionSummary, ZipFormat};
pub use installer::{InstallReport, PackInstaller};
pub use pack::{PackDescriptor, STAGING_SUFFIX};
pub use planner::{InstallPlan, PackPlanner};
pub use progress::{
    InstallCallbacks, InstallPhase, InstallProgress, PhaseCallback, ProgressCallback,
    ProgressReporter, ProgressSnapshot,
};
pub use traits::{
    ArchiveEntry, ArchiveFormat, BoxFuture, ByteStream, HttpResponse, HttpTransport, ReadSeek,
};
pub use volume::{MultiVolumeReader, VolumeSet};
