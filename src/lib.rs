//! Downloadview Library
//!
//! Serve files as HTTP downloads from application handlers, and optionally
//! hand the actual transfer over to a reverse proxy (Nginx X-Accel-Redirect,
//! Apache or Lighttpd X-Sendfile).
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`files`] - File wrappers: local, storage-backed, remote and in-memory
//! - [`response`] - Download responses and their default headers
//! - [`view`] - Download views: resolve a file, honor `If-Modified-Since`
//! - [`middleware`] - Download middlewares, decorators and the dispatcher
//! - [`proxy`] - Reverse-proxy offload backends
//! - [`config`] - Declarative offload rules and the backend registry
//! - [`shortcuts`] - One-call `sendfile` helpers
//!
//! # Example
//!
//! ```no_run
//! use downloadview::{DownloadRequest, DownloadView, PathResolver};
//!
//! # async fn run() -> Result<(), downloadview::DownloadError> {
//! let view = DownloadView::new(PathResolver::new("/srv/reports/2024.pdf"));
//! let response = view.render(&DownloadRequest::default()).await?;
//! let http_response = response.into_http().await?;
//! # let _ = http_response;
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod files;
pub mod io;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod shortcuts;
pub mod view;

// Re-export commonly used types
pub use config::{BackendRegistry, ConfigError, DownloadViewConfig, RuleConfig};
pub use error::DownloadError;
pub use files::{
    FileSystemStorage, FileWrapper, HttpFile, LocalFile, Storage, StorageFile, VirtualFile,
    WithMetadata,
};
pub use middleware::{
    Decorated, DownloadDispatcher, DownloadMiddleware, SmartDownloadMiddleware, decorate,
};
pub use proxy::{
    AccelSetting, NoRedirectionMatch, ProxiedRedirect, ProxiedResponse, ProxyBackend,
    XAccelRedirectMiddleware, XSendfileMiddleware,
};
pub use request::DownloadRequest;
pub use response::{DownloadOptions, DownloadResponse, Response, ResponseBody};
pub use shortcuts::{SendfileOptions, sendfile, storage_sendfile};
pub use view::{
    DownloadView, FileResolver, Handler, HttpResolver, ObjectResolver, PathResolver,
    StorageResolver, VirtualResolver,
};
