//! Download middlewares: detect download responses and transform them.
//!
//! # Architecture
//!
//! - [`DownloadMiddleware`] - Async trait every backend implements
//! - [`Decorated`] / [`decorate`] - Applies one middleware to one handler
//! - [`DownloadDispatcher`] - Threads a response through several middlewares
//! - [`SmartDownloadMiddleware`] - Dispatcher built from a rule configuration

mod dispatcher;

pub use dispatcher::{DownloadDispatcher, SmartDownloadMiddleware};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ConfigError, RuleConfig};
use crate::error::DownloadError;
use crate::proxy::{XAccelRedirectMiddleware, XSendfileMiddleware};
use crate::request::DownloadRequest;
use crate::response::{DownloadResponse, Response};
use crate::view::Handler;

/// Transforms download responses; other responses pass through.
#[async_trait]
pub trait DownloadMiddleware: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns true if `response` should be handed to
    /// [`process_download_response`](Self::process_download_response).
    fn is_download_response(&self, response: &Response) -> bool {
        matches!(response, Response::Download(_))
    }

    /// Entry point: transforms download responses, returns others unchanged.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`process_download_response`](Self::process_download_response).
    async fn process_response(
        &self,
        request: &DownloadRequest,
        response: Response,
    ) -> Result<Response, DownloadError> {
        if !self.is_download_response(&response) {
            return Ok(response);
        }
        match response {
            Response::Download(download) => self.process_download_response(request, download).await,
            other => Ok(other),
        }
    }

    /// Transforms one download response.
    ///
    /// Implementations return the response unchanged (as
    /// [`Response::Download`]) when they cannot handle it.
    ///
    /// # Errors
    ///
    /// Propagates metadata errors raised while building the new response.
    async fn process_download_response(
        &self,
        request: &DownloadRequest,
        response: DownloadResponse,
    ) -> Result<Response, DownloadError>;
}

/// A handler whose responses flow through one middleware.
pub struct Decorated<H> {
    handler: H,
    middleware: Arc<dyn DownloadMiddleware>,
}

impl<H> Decorated<H> {
    /// The wrapped handler.
    pub fn inner(&self) -> &H {
        &self.handler
    }

    /// The applied middleware.
    pub fn middleware(&self) -> &Arc<dyn DownloadMiddleware> {
        &self.middleware
    }
}

impl<H> fmt::Debug for Decorated<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decorated")
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<H: Handler> Handler for Decorated<H> {
    async fn handle(&self, request: &DownloadRequest) -> Result<Response, DownloadError> {
        let response = self.handler.handle(request).await?;
        self.middleware.process_response(request, response).await
    }
}

/// Applies `middleware` to every response of `handler`.
pub fn decorate<H: Handler>(handler: H, middleware: Arc<dyn DownloadMiddleware>) -> Decorated<H> {
    Decorated {
        handler,
        middleware,
    }
}

/// Offloads `handler`'s downloads to Nginx.
///
/// # Errors
///
/// Returns [`ConfigError::Misconfigured`] for incomplete rules, before any
/// request is served.
pub fn x_accel_redirect<H: Handler>(
    handler: H,
    rule: &RuleConfig,
) -> Result<Decorated<H>, ConfigError> {
    let middleware = XAccelRedirectMiddleware::from_rule(rule)?;
    Ok(decorate(handler, Arc::new(middleware)))
}

/// Offloads `handler`'s downloads to Apache.
///
/// # Errors
///
/// Returns [`ConfigError::Misconfigured`] for incomplete rules.
pub fn apache_x_sendfile<H: Handler>(
    handler: H,
    rule: &RuleConfig,
) -> Result<Decorated<H>, ConfigError> {
    let middleware = XSendfileMiddleware::apache_from_rule(rule)?;
    Ok(decorate(handler, Arc::new(middleware)))
}

/// Offloads `handler`'s downloads to Lighttpd.
///
/// # Errors
///
/// Returns [`ConfigError::Misconfigured`] for incomplete rules.
pub fn lighttpd_x_sendfile<H: Handler>(
    handler: H,
    rule: &RuleConfig,
) -> Result<Decorated<H>, ConfigError> {
    let middleware = XSendfileMiddleware::lighttpd_from_rule(rule)?;
    Ok(decorate(handler, Arc::new(middleware)))
}
