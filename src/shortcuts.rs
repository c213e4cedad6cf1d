//! One-call helpers in the style of `sendfile(request, path)`.
//!
//! Each helper builds a one-off [`DownloadView`] and renders it, so the
//! result gets the same 404/304 handling as a configured view.

use std::sync::Arc;

use tracing::instrument;

use crate::error::DownloadError;
use crate::files::Storage;
use crate::request::DownloadRequest;
use crate::response::{DownloadOptions, Response};
use crate::view::{DownloadView, PathResolver, StorageResolver};

/// Presentation options of the sendfile helpers.
///
/// Unlike views, helpers serve inline unless `attachment` is set.
#[derive(Debug, Clone, Default)]
pub struct SendfileOptions {
    /// Ask the client to save the file.
    pub attachment: bool,
    /// Client-side name; defaults to the file's basename.
    pub attachment_filename: Option<String>,
    /// MIME type override.
    pub mimetype: Option<String>,
    /// Content-Encoding override.
    pub encoding: Option<String>,
}

impl SendfileOptions {
    /// Attachment named `filename`.
    #[must_use]
    pub fn attachment(filename: impl Into<String>) -> Self {
        Self {
            attachment: true,
            attachment_filename: Some(filename.into()),
            ..Self::default()
        }
    }

    fn into_download_options(self) -> DownloadOptions {
        DownloadOptions {
            attachment: self.attachment,
            basename: self.attachment_filename,
            file_mimetype: self.mimetype,
            file_encoding: self.encoding,
            ..DownloadOptions::default()
        }
    }
}

/// Serves the local file at `path`.
///
/// # Errors
///
/// Propagates I/O errors other than a missing file, which yields a 404.
#[instrument(level = "debug", skip(request, options))]
pub async fn sendfile(
    request: &DownloadRequest,
    path: &str,
    options: SendfileOptions,
) -> Result<Response, DownloadError> {
    DownloadView::new(PathResolver::new(path))
        .with_options(options.into_download_options())
        .render(request)
        .await
}

/// Serves `name` from `storage`.
///
/// # Errors
///
/// Propagates storage errors other than a missing file, which yields a 404.
#[instrument(level = "debug", skip(request, storage, options))]
pub async fn storage_sendfile(
    request: &DownloadRequest,
    storage: Arc<dyn Storage>,
    name: &str,
    options: SendfileOptions,
) -> Result<Response, DownloadError> {
    DownloadView::new(StorageResolver::new(storage).with_name(name))
        .with_options(options.into_download_options())
        .render(request)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use http::StatusCode;
    use tempfile::TempDir;

    use super::*;
    use crate::files::FileSystemStorage;

    fn temp_file() -> (TempDir, String) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        (temp_dir, path.to_string_lossy().into_owned())
    }

    #[tokio::test]
    async fn test_sendfile_serves_inline_by_default() {
        let (_temp_dir, path) = temp_file();
        let mut response = sendfile(&DownloadRequest::default(), &path, SendfileOptions::default())
            .await
            .unwrap();
        let download = match &mut response {
            Response::Download(download) => download,
            other => panic!("expected download, got {other:?}"),
        };
        assert!(!download.attachment());
        let headers = download.default_headers().await.unwrap();
        assert!(headers.get("content-disposition").is_none());
        assert_eq!(headers.get("content-length").unwrap(), "8");
    }

    #[tokio::test]
    async fn test_sendfile_attachment_with_overrides() {
        let (_temp_dir, path) = temp_file();
        let options = SendfileOptions {
            mimetype: Some("text/csv".to_string()),
            encoding: Some("gzip".to_string()),
            ..SendfileOptions::attachment("numbers.csv")
        };
        let mut response = sendfile(&DownloadRequest::default(), &path, options)
            .await
            .unwrap();
        let Response::Download(download) = &mut response else {
            panic!("expected download");
        };
        let headers = download.default_headers().await.unwrap();
        assert_eq!(
            headers.get("content-disposition").unwrap(),
            "attachment; filename=\"numbers.csv\""
        );
        assert_eq!(headers.get("content-type").unwrap(), "text/csv; charset=utf-8");
        assert_eq!(headers.get("content-encoding").unwrap(), "gzip");
    }

    #[tokio::test]
    async fn test_sendfile_missing_file_is_404() {
        let response = sendfile(
            &DownloadRequest::default(),
            "/nonexistent/report.csv",
            SendfileOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_storage_sendfile() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "notes").unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileSystemStorage::new(temp_dir.path()));

        let response = storage_sendfile(
            &DownloadRequest::default(),
            Arc::clone(&storage),
            "notes.txt",
            SendfileOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.as_download().is_some());

        let response = storage_sendfile(
            &DownloadRequest::default(),
            storage,
            "missing.txt",
            SendfileOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
