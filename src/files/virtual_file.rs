//! In-memory and generated files.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use super::FileWrapper;
use crate::error::DownloadError;
use crate::io::{ByteStream, LazyContent, bytes_chunks, text_chunks};

/// Where a [`VirtualFile`] takes its bytes from.
enum Source {
    Buffer(Bytes),
    Stream(Option<ByteStream>),
}

/// Content generated by the application rather than stored anywhere.
///
/// Buffers know their size; chunk streams only know a size given through
/// [`with_size`](VirtualFile::with_size). Virtual files never answer
/// conditional GET and are never offloaded to a reverse proxy.
pub struct VirtualFile {
    name: String,
    url: Option<String>,
    size: Option<u64>,
    source: Source,
    content: LazyContent,
}

impl VirtualFile {
    /// Wraps an in-memory byte buffer.
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            url: None,
            size: Some(content.len() as u64),
            source: Source::Buffer(content),
            content: LazyContent::default(),
        }
    }

    /// Wraps text, encoded as UTF-8.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_bytes(name, Bytes::from(text.into().into_bytes()))
    }

    /// Wraps a chunk stream. Size is unknown unless set explicitly.
    pub fn from_stream(name: impl Into<String>, stream: ByteStream) -> Self {
        Self {
            name: name.into(),
            url: None,
            size: None,
            source: Source::Stream(Some(stream)),
            content: LazyContent::default(),
        }
    }

    /// Wraps a lazy sequence of text chunks.
    pub fn from_text_chunks<I, S>(name: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: Send + 'static,
        S: Into<String>,
    {
        Self::from_stream(name, text_chunks(chunks))
    }

    /// Sets the public URL of the file.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the size announced for a stream-backed file.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

impl fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Buffer(_) => "buffer",
            Source::Stream(_) => "stream",
        };
        f.debug_struct("VirtualFile")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("size", &self.size)
            .field("source", &source)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FileWrapper for VirtualFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> Option<String> {
        self.url.clone()
    }

    fn is_virtual(&self) -> bool {
        true
    }

    async fn size(&mut self) -> Result<Option<u64>, DownloadError> {
        Ok(self.size)
    }

    async fn open(&mut self) -> Result<ByteStream, DownloadError> {
        match &mut self.source {
            Source::Buffer(content) => Ok(bytes_chunks([content.clone()])),
            Source::Stream(stream) => stream
                .take()
                .ok_or_else(|| DownloadError::already_consumed(&self.name)),
        }
    }

    fn content(&mut self) -> &mut LazyContent {
        &mut self.content
    }
}
