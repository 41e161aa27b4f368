//! Pack download pipeline.
//!
//! This module provides the download half of an install run:
//! - HTTP transport over reqwest (`http`)
//! - Staging files and atomic publish (`staging`)
//! - Resumable byte-range fetches (`fetcher`)
//! - MD5 / SHA-256 checksum verification (`checksum`)
//! - Bounded parallel download of a pack list (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! PackDownloader (orchestrator)
//!         │
//!         ├── RangeFetcher ── HttpTransport (trait)
//!         │                       └── ReqwestTransport
//!         │
//!         ├── check_file (spawn_blocking)
//!         │
//!         └── StagingFile (.tmp → final)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use packstage::manager::download::{PackDownloader, RangeFetcher, ReqwestTransport};
//!
//! let transport = ReqwestTransport::new(Duration::from_secs(30), "packstage")?;
//! let fetcher = RangeFetcher::new(Arc::new(transport));
//! let downloader = PackDownloader::new(fetcher, "/games/endfield/Downloads", 4);
//!
//! let summary = downloader.download_all(&packs, &reporter, &cancel).await?;
//! println!("{} packs downloaded", summary.packs_downloaded);
//! ```

mod checksum;
pub(crate) mod http;
mod fetcher;
mod orchestrator;
mod staging;

pub use checksum::{calculate_file_checksum, check_file, ChecksumAlgorithm};
pub use fetcher::{FetchOutcome, RangeFetcher};
pub use http::ReqwestTransport;
pub use orchestrator::{DownloadSummary, PackDownloader};
pub use staging::StagingFile;
