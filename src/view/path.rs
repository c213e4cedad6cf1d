//! Serving files from a local path.

use std::sync::Arc;

use async_trait::async_trait;

use super::{FileResolver, PathTransform, ResolvedFile};
use crate::error::DownloadError;
use crate::files::LocalFile;
use crate::request::DownloadRequest;

/// Router parameter read when no static path is configured.
pub const DEFAULT_PATH_PARAM: &str = "path";

/// Resolves a local file from a static path or a request parameter.
#[derive(Clone)]
pub struct PathResolver {
    path: Option<String>,
    param: String,
    transform: Option<PathTransform>,
}

impl PathResolver {
    /// Always serves `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            param: DEFAULT_PATH_PARAM.to_string(),
            transform: None,
        }
    }

    /// Serves the path captured by the router as `param`.
    pub fn from_param(param: impl Into<String>) -> Self {
        Self {
            path: None,
            param: param.into(),
            transform: None,
        }
    }

    /// Rewrites the path per request before opening it.
    #[must_use]
    pub fn with_transform(
        mut self,
        transform: impl Fn(&DownloadRequest, String) -> String + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Path to serve for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::FileNotFound`] if neither a static path nor
    /// the request parameter is available.
    pub fn get_path(&self, request: &DownloadRequest) -> Result<String, DownloadError> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => request
                .param(&self.param)
                .map(str::to_string)
                .ok_or_else(|| {
                    DownloadError::file_not_found(format!("missing '{}' parameter", self.param))
                })?,
        };
        Ok(match &self.transform {
            Some(transform) => transform(request, path),
            None => path,
        })
    }
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver")
            .field("path", &self.path)
            .field("param", &self.param)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

#[async_trait]
impl FileResolver for PathResolver {
    async fn get_file(&self, request: &DownloadRequest) -> Result<ResolvedFile, DownloadError> {
        let path = self.get_path(request)?;
        Ok(ResolvedFile::new(LocalFile::open(path).await?))
    }
}
