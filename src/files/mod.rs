//! File wrappers: one contract over local files, storages, remote URLs and
//! generated content.
//!
//! # Architecture
//!
//! - [`FileWrapper`] - Async trait every source implements
//! - [`LocalFile`] - File on the local filesystem
//! - [`StorageFile`] - File behind a [`Storage`] backend
//! - [`HttpFile`] - Remote file fetched lazily over HTTP
//! - [`VirtualFile`] - In-memory or generated content
//! - [`WithMetadata`] - Overrides metadata of any wrapper
//!
//! Optional metadata is exposed as `Option`: `None` means the source cannot
//! tell, and callers degrade (no header, "modified", no proxy offload).

mod http;
mod local;
mod storage;
mod virtual_file;

pub use http::{HttpFile, HttpFileOptions};
pub use local::LocalFile;
pub use storage::{FileSystemStorage, Storage, StorageFile};
pub use virtual_file::VirtualFile;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::DownloadError;
use crate::io::{ByteStream, LazyContent};

/// Contract shared by every downloadable content source.
///
/// Implementors provide [`open`](Self::open) (acquire the source) and the
/// [`content`](Self::content) slot; [`stream`](Self::stream) and
/// [`read`](Self::read) are built on them so content is acquired once and
/// handed out once.
#[async_trait]
pub trait FileWrapper: Send + fmt::Debug {
    /// Identifier of the file: absolute path, storage key or client-side name.
    fn name(&self) -> &str;

    /// Public URL of the file, when the source has one.
    fn url(&self) -> Option<String> {
        None
    }

    /// Server-side filesystem path, when the content lives on local disk.
    fn local_path(&self) -> Option<PathBuf> {
        None
    }

    /// True for generated/in-memory content that no reverse proxy can serve.
    fn is_virtual(&self) -> bool {
        false
    }

    /// MIME type known by the source (without charset).
    fn mime_type(&self) -> Option<String> {
        None
    }

    /// Content encoding known by the source (e.g. `gzip`).
    fn encoding(&self) -> Option<String> {
        None
    }

    /// Charset known by the source.
    fn charset(&self) -> Option<String> {
        None
    }

    /// Size in bytes, `None` when unknown.
    async fn size(&mut self) -> Result<Option<u64>, DownloadError> {
        Ok(None)
    }

    /// Last modification time, `None` when unknown.
    async fn modified_time(&mut self) -> Result<Option<SystemTime>, DownloadError> {
        Ok(None)
    }

    /// Full Content-Type value, when the source dictates one.
    async fn content_type(&mut self) -> Result<Option<String>, DownloadError> {
        Ok(None)
    }

    /// The source's own answer to an `If-Modified-Since` value, if it has one.
    async fn was_modified_since(&mut self, _since: &str) -> Option<bool> {
        None
    }

    /// Acquires the underlying source. Called at most once per wrapper.
    async fn open(&mut self) -> Result<ByteStream, DownloadError>;

    /// Content slot backing [`stream`](Self::stream) and [`read`](Self::read).
    fn content(&mut self) -> &mut LazyContent;

    /// Hands out the (remaining) content as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::AlreadyConsumed`] on a second call, or the
    /// error raised while acquiring the source.
    async fn stream(&mut self) -> Result<ByteStream, DownloadError> {
        if self.content().is_pending() {
            let stream = self.open().await?;
            *self.content() = LazyContent::Consumed;
            return Ok(stream);
        }
        match self.content().take_stream() {
            Some(stream) => Ok(stream),
            None => Err(DownloadError::already_consumed(self.name())),
        }
    }

    /// Reads at most `max_bytes` bytes (everything left when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::AlreadyConsumed`] after [`stream`](Self::stream),
    /// or the IO error raised by the source.
    async fn read(&mut self, max_bytes: Option<usize>) -> Result<Bytes, DownloadError> {
        if self.content().is_pending() {
            let stream = self.open().await?;
            self.content().start(stream);
        }
        let name = self.name().to_string();
        match self.content().reader() {
            Some(reader) => reader
                .read(max_bytes)
                .await
                .map_err(|source| DownloadError::io(name, source)),
            None => Err(DownloadError::already_consumed(name)),
        }
    }
}

/// Returns the last path component of a wrapper name.
#[must_use]
pub fn name_basename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|basename| basename.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Metadata overrides applied on top of another wrapper.
///
/// Mirrors a record holding deserialized file metadata next to the file
/// itself: each `Some` value replaces what the inner wrapper reports.
#[derive(Debug)]
pub struct WithMetadata {
    inner: Box<dyn FileWrapper>,
    /// MIME type override.
    pub mime_type: Option<String>,
    /// Content encoding override.
    pub encoding: Option<String>,
    /// Charset override.
    pub charset: Option<String>,
    /// Modification time override.
    pub modified_time: Option<SystemTime>,
    /// Size override.
    pub size: Option<u64>,
}

impl WithMetadata {
    /// Wraps `inner` without overriding anything yet.
    #[must_use]
    pub fn new(inner: Box<dyn FileWrapper>) -> Self {
        Self {
            inner,
            mime_type: None,
            encoding: None,
            charset: None,
            modified_time: None,
            size: None,
        }
    }

    /// Returns true if no override is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mime_type.is_none()
            && self.encoding.is_none()
            && self.charset.is_none()
            && self.modified_time.is_none()
            && self.size.is_none()
    }

    /// Returns the wrapped file.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn FileWrapper> {
        self.inner
    }
}

#[async_trait]
impl FileWrapper for WithMetadata {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn url(&self) -> Option<String> {
        self.inner.url()
    }

    fn local_path(&self) -> Option<PathBuf> {
        self.inner.local_path()
    }

    fn is_virtual(&self) -> bool {
        self.inner.is_virtual()
    }

    fn mime_type(&self) -> Option<String> {
        self.mime_type.clone().or_else(|| self.inner.mime_type())
    }

    fn encoding(&self) -> Option<String> {
        self.encoding.clone().or_else(|| self.inner.encoding())
    }

    fn charset(&self) -> Option<String> {
        self.charset.clone().or_else(|| self.inner.charset())
    }

    async fn size(&mut self) -> Result<Option<u64>, DownloadError> {
        match self.size {
            Some(size) => Ok(Some(size)),
            None => self.inner.size().await,
        }
    }

    async fn modified_time(&mut self) -> Result<Option<SystemTime>, DownloadError> {
        match self.modified_time {
            Some(time) => Ok(Some(time)),
            None => self.inner.modified_time().await,
        }
    }

    async fn content_type(&mut self) -> Result<Option<String>, DownloadError> {
        self.inner.content_type().await
    }

    async fn was_modified_since(&mut self, since: &str) -> Option<bool> {
        self.inner.was_modified_since(since).await
    }

    async fn open(&mut self) -> Result<ByteStream, DownloadError> {
        self.inner.open().await
    }

    fn content(&mut self) -> &mut LazyContent {
        self.inner.content()
    }

    async fn stream(&mut self) -> Result<ByteStream, DownloadError> {
        self.inner.stream().await
    }

    async fn read(&mut self, max_bytes: Option<usize>) -> Result<Bytes, DownloadError> {
        self.inner.read(max_bytes).await
    }
}
