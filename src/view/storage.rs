//! Serving files from a storage backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::path::DEFAULT_PATH_PARAM;
use super::{FileResolver, PathTransform, ResolvedFile};
use crate::error::DownloadError;
use crate::files::{Storage, StorageFile};
use crate::request::DownloadRequest;

/// Resolves a storage-relative name, statically or from a request parameter.
#[derive(Clone)]
pub struct StorageResolver {
    storage: Arc<dyn Storage>,
    name: Option<String>,
    param: String,
    transform: Option<PathTransform>,
}

impl StorageResolver {
    /// Serves names captured by the router as `path`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            name: None,
            param: DEFAULT_PATH_PARAM.to_string(),
            transform: None,
        }
    }

    /// Always serves `name`.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Reads the name from router parameter `param`.
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    /// Rewrites the name per request (e.g. prefixing the user's directory).
    #[must_use]
    pub fn with_transform(
        mut self,
        transform: impl Fn(&DownloadRequest, String) -> String + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    fn get_name(&self, request: &DownloadRequest) -> Result<String, DownloadError> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => request
                .param(&self.param)
                .map(str::to_string)
                .ok_or_else(|| {
                    DownloadError::file_not_found(format!("missing '{}' parameter", self.param))
                })?,
        };
        Ok(match &self.transform {
            Some(transform) => transform(request, name),
            None => name,
        })
    }
}

impl std::fmt::Debug for StorageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageResolver")
            .field("storage", &self.storage)
            .field("name", &self.name)
            .field("param", &self.param)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FileResolver for StorageResolver {
    async fn get_file(&self, request: &DownloadRequest) -> Result<ResolvedFile, DownloadError> {
        let name = self.get_name(request)?;
        if !self.storage.exists(&name).await? {
            debug!(name = %name, "not in storage");
            return Err(DownloadError::file_not_found(format!(
                "'{name}' is not in storage"
            )));
        }
        Ok(ResolvedFile::new(StorageFile::new(
            Arc::clone(&self.storage),
            name,
        )))
    }
}
