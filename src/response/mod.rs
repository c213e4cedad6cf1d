//! Responses produced by views and transformed by middlewares.
//!
//! # Architecture
//!
//! - [`DownloadResponse`] - A file being downloaded, headers computed lazily
//! - [`ProxiedResponse`] - Instructions for a reverse proxy to serve the file
//! - [`Response`] - What a handler returns: one of the above, or a plain `http` response
//! - [`ResponseBody`] - Streaming body of the `http` response

mod disposition;
mod download;
mod headers;

pub use disposition::{content_disposition, encode_basename_ascii, encode_basename_utf8};
pub use download::{DEFAULT_CHARSET, DEFAULT_MIME_TYPE, DownloadOptions, DownloadResponse};
pub(crate) use download::header_value;
pub use headers::{content_type_to_charset, url_basename};

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};

use crate::error::DownloadError;
use crate::io::{ByteStream, bytes_chunks, collect};
pub use crate::proxy::ProxiedResponse;

/// Body of a response: a byte stream, possibly empty.
pub struct ResponseBody {
    stream: Option<ByteStream>,
}

impl ResponseBody {
    /// A body without content.
    #[must_use]
    pub fn empty() -> Self {
        Self { stream: None }
    }

    /// A body streaming `stream`.
    #[must_use]
    pub fn from_stream(stream: ByteStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// A body holding `content`.
    #[must_use]
    pub fn from_bytes(content: impl Into<Bytes>) -> Self {
        Self::from_stream(bytes_chunks([content.into()]))
    }

    /// True if the body was built without content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stream.is_none()
    }

    /// Drains the body into memory.
    ///
    /// # Errors
    ///
    /// Propagates the first error yielded by the stream.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self.stream {
            Some(stream) => collect(stream).await,
            None => Ok(Bytes::new()),
        }
    }
}

impl Stream for ResponseBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.stream.as_mut() {
            Some(stream) => stream.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody")
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// Outcome of a handler, as seen by middlewares.
#[derive(Debug)]
pub enum Response {
    /// A file to stream.
    Download(DownloadResponse),
    /// A file handed over to a reverse proxy.
    Proxied(ProxiedResponse),
    /// Any other response (404, 304, host-built responses).
    Http(http::Response<ResponseBody>),
}

impl Response {
    /// Empty response with `status`.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        let mut response = http::Response::new(ResponseBody::empty());
        *response.status_mut() = status;
        Self::Http(response)
    }

    /// 404 Not Found, no body.
    #[must_use]
    pub fn not_found() -> Self {
        Self::empty(StatusCode::NOT_FOUND)
    }

    /// 304 Not Modified carrying the Content-Type the download would have had.
    #[must_use]
    pub fn not_modified(content_type: Option<HeaderValue>) -> Self {
        let mut response = http::Response::new(ResponseBody::empty());
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        if let Some(content_type) = content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        Self::Http(response)
    }

    /// Status that will be sent.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Download(download) => download.status(),
            Self::Proxied(proxied) => proxied.status(),
            Self::Http(response) => response.status(),
        }
    }

    /// The download response, if this is one.
    #[must_use]
    pub fn as_download(&self) -> Option<&DownloadResponse> {
        match self {
            Self::Download(download) => Some(download),
            _ => None,
        }
    }

    /// The proxied response, if this is one.
    #[must_use]
    pub fn as_proxied(&self) -> Option<&ProxiedResponse> {
        match self {
            Self::Proxied(proxied) => Some(proxied),
            _ => None,
        }
    }

    /// Converts into an `http` response ready to be written by the host.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`DownloadResponse::into_http`].
    pub async fn into_http(self) -> Result<http::Response<ResponseBody>, DownloadError> {
        match self {
            Self::Download(download) => download.into_http().await,
            Self::Proxied(proxied) => Ok(proxied.into_http()),
            Self::Http(response) => Ok(response),
        }
    }
}

impl From<DownloadResponse> for Response {
    fn from(download: DownloadResponse) -> Self {
        Self::Download(download)
    }
}

impl From<ProxiedResponse> for Response {
    fn from(proxied: ProxiedResponse) -> Self {
        Self::Proxied(proxied)
    }
}
