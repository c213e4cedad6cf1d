//! Ordered middleware dispatch, optionally built from rules.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::DownloadMiddleware;
use crate::config::{BackendRegistry, ConfigError, DownloadViewConfig};
use crate::error::DownloadError;
use crate::request::DownloadRequest;
use crate::response::{DownloadResponse, Response};

/// Threads download responses through keyed middlewares, in order.
///
/// Once a middleware has turned the download into something else, the
/// following middlewares see a non-download response and pass it through,
/// so the first matching rule wins.
#[derive(Debug, Default, Clone)]
pub struct DownloadDispatcher {
    middlewares: Vec<(String, Arc<dyn DownloadMiddleware>)>,
}

impl DownloadDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` under `key`.
    pub fn push(&mut self, key: impl Into<String>, middleware: Arc<dyn DownloadMiddleware>) {
        self.middlewares.push((key.into(), middleware));
    }

    /// Appends `middleware` under `key` (builder style).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, middleware: Arc<dyn DownloadMiddleware>) -> Self {
        self.push(key, middleware);
        self
    }

    /// Keys, in application order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.middlewares.iter().map(|(key, _)| key.as_str()).collect()
    }

    /// Number of middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns true if no middleware is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

#[async_trait]
impl DownloadMiddleware for DownloadDispatcher {
    fn name(&self) -> &str {
        "dispatcher"
    }

    #[instrument(level = "debug", skip_all, fields(middlewares = self.middlewares.len()))]
    async fn process_download_response(
        &self,
        request: &DownloadRequest,
        response: DownloadResponse,
    ) -> Result<Response, DownloadError> {
        let mut response = Response::Download(response);
        for (key, middleware) in &self.middlewares {
            response = middleware.process_response(request, response).await?;
            debug!(key = %key, status = %response.status(), "middleware applied");
        }
        Ok(response)
    }
}

/// Dispatcher configured from a [`DownloadViewConfig`].
#[derive(Debug, Clone)]
pub struct SmartDownloadMiddleware {
    dispatcher: DownloadDispatcher,
}

impl SmartDownloadMiddleware {
    /// Builds one middleware per rule with the default backends.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Misconfigured`] for unknown backends or
    /// incomplete rules.
    pub fn from_config(config: &DownloadViewConfig) -> Result<Self, ConfigError> {
        Self::with_registry(config, &BackendRegistry::with_defaults())
    }

    /// Builds one middleware per rule, resolving backends in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Misconfigured`] for unknown backends or
    /// incomplete rules; the message names the offending rule.
    pub fn with_registry(
        config: &DownloadViewConfig,
        registry: &BackendRegistry,
    ) -> Result<Self, ConfigError> {
        let mut dispatcher = DownloadDispatcher::new();
        for (index, rule) in config.rules.iter().enumerate() {
            let backend = config.backend_for(rule);
            let middleware = registry.build(backend, rule).map_err(|error| match error {
                ConfigError::Misconfigured { message } => ConfigError::misconfigured(format!(
                    "rule #{index} ({}): {message}",
                    rule.describe()
                )),
                other => other,
            })?;
            dispatcher.push(format!("{index}:{backend}"), middleware);
        }
        info!(
            rules = dispatcher.len(),
            backend = %config.backend,
            "download middleware configured"
        );
        Ok(Self { dispatcher })
    }

    /// Underlying dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &DownloadDispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl DownloadMiddleware for SmartDownloadMiddleware {
    fn name(&self) -> &str {
        "smart"
    }

    async fn process_download_response(
        &self,
        request: &DownloadRequest,
        response: DownloadResponse,
    ) -> Result<Response, DownloadError> {
        self.dispatcher
            .process_download_response(request, response)
            .await
    }
}
