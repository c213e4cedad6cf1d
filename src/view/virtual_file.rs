//! Serving generated content.

use std::sync::Arc;

use async_trait::async_trait;

use super::{FileResolver, Freshness, ResolvedFile};
use crate::error::DownloadError;
use crate::files::FileWrapper;
use crate::request::DownloadRequest;

type Factory =
    Arc<dyn Fn(&DownloadRequest) -> Result<Box<dyn FileWrapper>, DownloadError> + Send + Sync>;

/// Resolves a file built by the caller for each request.
///
/// Freshness is only decided by the file itself: generated content would
/// have to be materialized to know whether it changed.
#[derive(Clone)]
pub struct VirtualResolver {
    factory: Factory,
}

impl VirtualResolver {
    /// Builds the file with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&DownloadRequest) -> Result<Box<dyn FileWrapper>, DownloadError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }
}

impl std::fmt::Debug for VirtualResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl FileResolver for VirtualResolver {
    async fn get_file(&self, request: &DownloadRequest) -> Result<ResolvedFile, DownloadError> {
        (self.factory)(request).map(ResolvedFile::from_boxed)
    }

    fn freshness(&self) -> Freshness {
        Freshness::DelegateOnly
    }
}
