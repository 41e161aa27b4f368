//! Seams between the installer pipeline and its external collaborators.
//!
//! - [`HttpTransport`]: issues GET requests, optionally with a `Range` start,
//!   and hands back the status and a byte stream. TLS, proxies and
//!   credentials are properties of the transport.
//! - [`ArchiveFormat`]: reads an archive from a seekable byte source, lists
//!   its entries and extracts them with cumulative progress.
//!
//! Both are object safe so the installer can hold them as `Arc<dyn _>` and
//! tests can swap in mocks.

use std::future::Future;
use std::io::{Read, Seek};
use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use super::error::InstallerResult;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Streamed response body.
pub type ByteStream = BoxStream<'static, InstallerResult<Bytes>>;

/// Response headers and body of a GET request.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, consumed chunk by chunk.
    pub body: ByteStream,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the server honoured a range request.
    pub fn is_partial_content(&self) -> bool {
        self.status == 206
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// HTTP transport used by the fetcher.
pub trait HttpTransport: Send + Sync {
    /// Issue a GET for `url`.
    ///
    /// When `range_start` is set the request carries `Range: bytes=<start>-`.
    /// Non-success statuses are returned as responses, not errors; only
    /// transport failures are errors.
    fn get<'a>(
        &'a self,
        url: &'a str,
        range_start: Option<u64>,
    ) -> BoxFuture<'a, InstallerResult<HttpResponse>>;
}

/// A seekable byte source an archive can be read from.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// One entry of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the entry inside the archive.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Archive-reading capability.
pub trait ArchiveFormat: Send + Sync {
    /// Short name of the format for logs.
    fn name(&self) -> &'static str;

    /// Enumerate the entries of the archive.
    fn list_entries(&self, source: &mut dyn ReadSeek) -> InstallerResult<Vec<ArchiveEntry>>;

    /// Extract every entry below `dest_dir`.
    ///
    /// `on_progress` receives the cumulative number of uncompressed bytes
    /// written so far. Implementations check `cancel` at least once per entry
    /// and per buffered write, returning `InstallError::Cancelled` when set.
    /// Returns the number of entries extracted.
    fn extract_all(
        &self,
        source: &mut dyn ReadSeek,
        dest_dir: &Path,
        on_progress: &mut dyn FnMut(u64),
        cancel: &CancellationToken,
    ) -> InstallerResult<usize>;
}
