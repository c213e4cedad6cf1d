//! Remote files fetched over HTTP.
//!
//! The GET request is issued on first metadata or content access and its body
//! is streamed, never buffered. No retry: failures propagate to the caller,
//! and a failed request is not remembered as fetched, so every later access
//! reports a failure of its own instead of empty metadata.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use tracing::{debug, instrument};
use url::Url;

use super::FileWrapper;
use crate::error::DownloadError;
use crate::io::{ByteStream, LazyContent};

/// Name used when the URL path has no last segment.
const DEFAULT_NAME: &str = "index.html";

/// Pass-through options for the upstream request.
#[derive(Debug, Clone, Default)]
pub struct HttpFileOptions {
    /// Whole-request timeout. None by default.
    pub timeout: Option<Duration>,
    /// Extra request headers (authentication, cookies, ...).
    pub headers: HeaderMap,
}

/// A file served by a remote HTTP server.
#[derive(Debug)]
pub struct HttpFile {
    client: Client,
    url: String,
    name: String,
    options: HttpFileOptions,
    fetched: bool,
    response: Option<reqwest::Response>,
    size: Option<u64>,
    content_type: Option<String>,
    content: LazyContent,
}

impl HttpFile {
    /// Wraps `url` using a default client.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    /// Wraps `url` using `client`, so connection pools can be shared.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            client,
            name: url_name(&url),
            url,
            options: HttpFileOptions::default(),
            fetched: false,
            response: None,
            size: None,
            content_type: None,
            content: LazyContent::default(),
        }
    }

    /// Sets request options.
    #[must_use]
    pub fn with_options(mut self, options: HttpFileOptions) -> Self {
        self.options = options;
        self
    }

    /// Issues the GET request unless a previous one succeeded.
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn ensure_response(&mut self) -> Result<(), DownloadError> {
        if self.fetched {
            return Ok(());
        }

        let mut request = self
            .client
            .get(&self.url)
            .headers(self.options.headers.clone());
        if let Some(timeout) = self.options.timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|source| DownloadError::network(&self.url, source))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DownloadError::file_not_found(format!(
                "upstream returned 404 for {}",
                self.url
            )));
        }
        if !status.is_success() {
            return Err(DownloadError::http_status(&self.url, status.as_u16()));
        }

        let headers = response.headers();
        self.size = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
        self.content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        debug!(
            status = status.as_u16(),
            size = ?self.size,
            content_type = ?self.content_type,
            "upstream responded"
        );
        self.response = Some(response);
        self.fetched = true;
        Ok(())
    }
}

/// Last path segment of `url`, or `index.html`.
fn url_name(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url)
        && let Some(mut segments) = parsed.path_segments()
        && let Some(last) = segments.next_back()
        && !last.is_empty()
    {
        return urlencoding::decode(last)
            .map_or_else(|_| last.to_string(), std::borrow::Cow::into_owned);
    }
    DEFAULT_NAME.to_string()
}

#[async_trait]
impl FileWrapper for HttpFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> Option<String> {
        Some(self.url.clone())
    }

    async fn size(&mut self) -> Result<Option<u64>, DownloadError> {
        self.ensure_response().await?;
        Ok(self.size)
    }

    async fn content_type(&mut self) -> Result<Option<String>, DownloadError> {
        self.ensure_response().await?;
        Ok(self.content_type.clone())
    }

    async fn open(&mut self) -> Result<ByteStream, DownloadError> {
        self.ensure_response().await?;
        let response = self
            .response
            .take()
            .ok_or_else(|| DownloadError::already_consumed(&self.url))?;
        Ok(response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)).boxed())
    }

    fn content(&mut self) -> &mut LazyContent {
        &mut self.content
    }
}
