//! Files on the local filesystem.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use super::FileWrapper;
use crate::error::DownloadError;
use crate::io::{ByteStream, LazyContent};

/// Read buffer size used when streaming local files.
const CHUNK_SIZE: usize = 64 * 1024;

/// A regular file on the local filesystem.
///
/// Metadata is read once, when the wrapper is created. The file handle is
/// opened on first read/stream and closed when the stream is dropped.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    size: u64,
    modified_time: Option<SystemTime>,
    content: LazyContent,
}

impl LocalFile {
    /// Wraps the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::FileNotFound`] if `path` does not exist or is
    /// not a regular file, [`DownloadError::Io`] if it cannot be inspected.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DownloadError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| DownloadError::from_io(&path, source))?;
        if !metadata.is_file() {
            return Err(DownloadError::file_not_found(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }
        let modified_time = metadata.modified().ok();
        debug!(size = metadata.len(), "local file found");
        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            path,
            size: metadata.len(),
            modified_time,
            content: LazyContent::default(),
        })
    }

    /// Server-side path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileWrapper for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    async fn size(&mut self) -> Result<Option<u64>, DownloadError> {
        Ok(Some(self.size))
    }

    async fn modified_time(&mut self) -> Result<Option<SystemTime>, DownloadError> {
        Ok(self.modified_time)
    }

    async fn open(&mut self) -> Result<ByteStream, DownloadError> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|source| DownloadError::from_io(&self.path, source))?;
        Ok(ReaderStream::with_capacity(file, CHUNK_SIZE).boxed())
    }

    fn content(&mut self) -> &mut LazyContent {
        &mut self.content
    }
}
