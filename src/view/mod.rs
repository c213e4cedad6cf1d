//! Download views: resolve a file for a request, honor conditional GET and
//! build the download response.
//!
//! # Architecture
//!
//! - [`DownloadView`] - Generic view, parameterized by a [`FileResolver`]
//! - [`FileResolver`] - Strategy locating the file for a request
//! - [`PathResolver`], [`StorageResolver`], [`HttpResolver`],
//!   [`ObjectResolver`], [`VirtualResolver`] - Bundled strategies
//! - [`Handler`] - Anything turning a request into a [`Response`]
//!
//! A view goes through three states: the file is resolved (or the view
//! answers 404), then freshness is checked when the request is conditional
//! (the view answers 304 if the client copy is current), then the download
//! response is built.

mod conditional;
mod http;
mod object;
mod path;
mod storage;
mod virtual_file;

pub use conditional::was_modified_since;
pub use http::HttpResolver;
pub use object::{ObjectFields, ObjectResolver, Record, RecordSource};
pub use path::PathResolver;
pub use storage::StorageResolver;
pub use virtual_file::VirtualResolver;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::DownloadError;
use crate::files::FileWrapper;
use crate::request::DownloadRequest;
use crate::response::{DownloadOptions, DownloadResponse, Response, header_value};

/// Per-request rewrite of a resolved path or storage name.
pub type PathTransform = Arc<dyn Fn(&DownloadRequest, String) -> String + Send + Sync>;

/// A file located by a resolver, with an optional client-side name.
#[derive(Debug)]
pub struct ResolvedFile {
    /// The file to serve.
    pub file: Box<dyn FileWrapper>,
    /// Basename suggested by the resolver (e.g. read from a record field).
    pub basename: Option<String>,
}

impl ResolvedFile {
    /// Wraps `file` without a basename suggestion.
    pub fn new(file: impl FileWrapper + 'static) -> Self {
        Self::from_boxed(Box::new(file))
    }

    /// Wraps an already boxed file.
    #[must_use]
    pub fn from_boxed(file: Box<dyn FileWrapper>) -> Self {
        Self {
            file,
            basename: None,
        }
    }

    /// Suggests a client-side name.
    #[must_use]
    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }
}

/// How a view decides whether a file changed since `If-Modified-Since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Ask the file, then compare its modification time and size.
    #[default]
    Standard,
    /// Ask the file only; if it cannot answer, the file is modified.
    DelegateOnly,
}

/// Strategy locating the file to serve for a request.
#[async_trait]
pub trait FileResolver: Send + Sync {
    /// Locates the file.
    ///
    /// # Errors
    ///
    /// [`DownloadError::FileNotFound`] makes the view answer 404; other
    /// errors propagate.
    async fn get_file(&self, request: &DownloadRequest) -> Result<ResolvedFile, DownloadError>;

    /// Freshness policy for files returned by this resolver.
    fn freshness(&self) -> Freshness {
        Freshness::Standard
    }
}

/// Anything that turns a request into a response.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles `request`.
    ///
    /// # Errors
    ///
    /// Propagates errors that are not turned into responses.
    async fn handle(&self, request: &DownloadRequest) -> Result<Response, DownloadError>;
}

/// Serves the file located by a [`FileResolver`].
pub struct DownloadView {
    resolver: Box<dyn FileResolver>,
    options: DownloadOptions,
}

impl DownloadView {
    /// Creates a view serving attachments located by `resolver`.
    pub fn new(resolver: impl FileResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            options: DownloadOptions::default(),
        }
    }

    /// Replaces the presentation options.
    #[must_use]
    pub fn with_options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    /// Serves files as attachments (`true`) or inline.
    #[must_use]
    pub fn attachment(mut self, attachment: bool) -> Self {
        self.options.attachment = attachment;
        self
    }

    /// Forces the client-side name of every served file.
    #[must_use]
    pub fn basename(mut self, basename: impl Into<String>) -> Self {
        self.options.basename = Some(basename.into());
        self
    }

    /// Builds the response for `request`: 404, 304 or a download.
    ///
    /// # Errors
    ///
    /// Propagates resolver and metadata errors other than
    /// [`DownloadError::FileNotFound`].
    #[instrument(level = "debug", skip(self, request), fields(uri = %request.uri()))]
    pub async fn render(&self, request: &DownloadRequest) -> Result<Response, DownloadError> {
        match self.build(request).await {
            Err(error) if error.is_not_found() => {
                debug!(%error, "file not found");
                Ok(Response::not_found())
            }
            other => other,
        }
    }

    async fn build(&self, request: &DownloadRequest) -> Result<Response, DownloadError> {
        let resolved = self.resolver.get_file(request).await?;
        let mut options = self.options.clone();
        if options.basename.is_none() {
            options.basename = resolved.basename;
        }
        let mut response = DownloadResponse::new(resolved.file, options);

        if let Some(since) = request.if_modified_since()
            && !self.was_modified_since(response.file_mut(), since).await?
        {
            debug!(since, "file not modified");
            let content_type = response.content_type().await?;
            return Ok(Response::not_modified(Some(header_value(
                "Content-Type",
                &content_type,
            )?)));
        }
        Ok(Response::Download(response))
    }

    /// Freshness check: the file's own answer, then (standard policy only)
    /// modification time and size. Defaults to modified.
    async fn was_modified_since(
        &self,
        file: &mut dyn FileWrapper,
        since: &str,
    ) -> Result<bool, DownloadError> {
        if let Some(modified) = file.was_modified_since(since).await {
            return Ok(modified);
        }
        match self.resolver.freshness() {
            Freshness::DelegateOnly => Ok(true),
            Freshness::Standard => {
                let Some(modified_time) = file.modified_time().await? else {
                    return Ok(true);
                };
                let size = file.size().await?;
                Ok(was_modified_since(since, Some(modified_time), size))
            }
        }
    }
}

impl fmt::Debug for DownloadView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadView")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Handler for DownloadView {
    async fn handle(&self, request: &DownloadRequest) -> Result<Response, DownloadError> {
        self.render(request).await
    }
}
