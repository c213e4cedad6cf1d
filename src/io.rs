//! Low-level IO for file wrappers: byte streams and a file-like reader over them.
//!
//! [`ChunkReader`] turns a lazy sequence of chunks (bytes, or text encoded as
//! UTF-8) into `read(max)` / `read_line()` calls, and [`LazyContent`] is the
//! slot each wrapper keeps so that content is acquired once and handed out once.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt};

/// Lazy, forward-only, finite sequence of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Boxes any chunk stream into a [`ByteStream`].
pub fn byte_stream<S>(stream: S) -> ByteStream
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    Box::pin(stream)
}

/// Adapts an iterator of byte chunks.
pub fn bytes_chunks<I, B>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = B>,
    I::IntoIter: Send + 'static,
    B: Into<Bytes>,
{
    Box::pin(stream::iter(chunks.into_iter().map(|chunk| Ok(chunk.into()))))
}

/// Adapts an iterator of text chunks; text is encoded as UTF-8.
pub fn text_chunks<I, S>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = S>,
    I::IntoIter: Send + 'static,
    S: Into<String>,
{
    Box::pin(stream::iter(
        chunks
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk.into().into_bytes()))),
    ))
}

/// File-like reader over a [`ByteStream`].
pub struct ChunkReader {
    stream: Option<ByteStream>,
    left: Bytes,
}

impl ChunkReader {
    /// Wraps a chunk stream.
    #[must_use]
    pub fn new(stream: ByteStream) -> Self {
        Self {
            stream: Some(stream),
            left: Bytes::new(),
        }
    }

    /// Pulls chunks until a non-empty one is buffered. Returns false at end of stream.
    async fn fill(&mut self) -> io::Result<bool> {
        while self.left.is_empty() {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(false);
            };
            match stream.next().await {
                Some(chunk) => self.left = chunk?,
                None => {
                    self.stream = None;
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Reads at most `max` bytes, or everything left when `max` is `None`.
    ///
    /// Returns empty bytes once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates the first error yielded by the underlying stream.
    pub async fn read(&mut self, max: Option<usize>) -> io::Result<Bytes> {
        let mut out = BytesMut::new();
        let mut remaining = max.unwrap_or(usize::MAX);
        while remaining > 0 && self.fill().await? {
            let take = remaining.min(self.left.len());
            out.extend_from_slice(&self.left.split_to(take));
            remaining -= take;
        }
        Ok(out.freeze())
    }

    /// Reads up to and including the next `\n`, or the rest of the stream.
    ///
    /// # Errors
    ///
    /// Propagates the first error yielded by the underlying stream.
    pub async fn read_line(&mut self) -> io::Result<Bytes> {
        let mut out = BytesMut::new();
        while self.fill().await? {
            if let Some(pos) = self.left.iter().position(|b| *b == b'\n') {
                out.extend_from_slice(&self.left.split_to(pos + 1));
                break;
            }
            out.extend_from_slice(&self.left);
            self.left.clear();
        }
        Ok(out.freeze())
    }

    /// Returns the unread remainder as a stream.
    #[must_use]
    pub fn into_stream(self) -> ByteStream {
        let head = (!self.left.is_empty()).then_some(Ok(self.left));
        match self.stream {
            Some(rest) => Box::pin(stream::iter(head).chain(rest)),
            None => Box::pin(stream::iter(head)),
        }
    }
}

impl fmt::Debug for ChunkReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkReader")
            .field("buffered", &self.left.len())
            .field("exhausted", &self.stream.is_none())
            .finish()
    }
}

/// Content slot of a file wrapper.
///
/// Content is acquired at most once. `read` calls keep a [`ChunkReader`] in
/// the slot; `stream` hands out whatever is left and marks the slot consumed.
#[derive(Default)]
pub enum LazyContent {
    /// Source not acquired yet.
    #[default]
    Pending,
    /// Source acquired and partly read.
    Reading(ChunkReader),
    /// Content handed out as a stream.
    Consumed,
}

impl LazyContent {
    /// Returns true if the underlying source was never acquired.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Stores a freshly acquired stream for incremental reads.
    pub fn start(&mut self, stream: ByteStream) {
        *self = Self::Reading(ChunkReader::new(stream));
    }

    /// Takes the unread remainder, leaving the slot consumed.
    ///
    /// Returns `None` if nothing was acquired or it was already taken.
    pub fn take_stream(&mut self) -> Option<ByteStream> {
        match std::mem::replace(self, Self::Consumed) {
            Self::Reading(reader) => Some(reader.into_stream()),
            Self::Pending => {
                *self = Self::Pending;
                None
            }
            Self::Consumed => None,
        }
    }

    /// Returns the active reader, if any.
    pub fn reader(&mut self) -> Option<&mut ChunkReader> {
        match self {
            Self::Reading(reader) => Some(reader),
            Self::Pending | Self::Consumed => None,
        }
    }
}

impl fmt::Debug for LazyContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Reading(reader) => f.debug_tuple("Reading").field(reader).finish(),
            Self::Consumed => f.write_str("Consumed"),
        }
    }
}

/// Drains a stream into memory.
///
/// # Errors
///
/// Propagates the first error yielded by the stream.
pub async fn collect(stream: ByteStream) -> io::Result<Bytes> {
    ChunkReader::new(stream).read(None).await
}
