//! Apache (`mod_xsendfile`) and Lighttpd X-Sendfile.

use async_trait::async_trait;
use tracing::debug;

use super::{ProxiedRedirect, ProxiedResponse, ProxyBackend, insert_header, proxied_headers};
use crate::config::{ConfigError, RuleConfig};
use crate::error::DownloadError;
use crate::middleware::DownloadMiddleware;
use crate::request::DownloadRequest;
use crate::response::{DownloadResponse, Response};

/// Turns download responses into `X-Sendfile` responses.
///
/// The destination is a directory on the proxy's filesystem.
#[derive(Debug, Clone)]
pub struct XSendfileMiddleware {
    backend: ProxyBackend,
    redirect: ProxiedRedirect,
}

impl XSendfileMiddleware {
    /// Middleware for Apache.
    #[must_use]
    pub fn apache(redirect: ProxiedRedirect) -> Self {
        Self {
            backend: ProxyBackend::Apache,
            redirect,
        }
    }

    /// Middleware for Lighttpd.
    #[must_use]
    pub fn lighttpd(redirect: ProxiedRedirect) -> Self {
        Self {
            backend: ProxyBackend::Lighttpd,
            redirect,
        }
    }

    fn redirect_from_rule(rule: &RuleConfig) -> Result<ProxiedRedirect, ConfigError> {
        ProxiedRedirect::new(
            rule.source_dir.clone(),
            rule.source_url.clone(),
            rule.destination_url.clone(),
        )
    }

    /// Apache middleware described by `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Misconfigured`] for incomplete rules.
    pub fn apache_from_rule(rule: &RuleConfig) -> Result<Self, ConfigError> {
        Self::redirect_from_rule(rule).map(Self::apache)
    }

    /// Lighttpd middleware described by `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Misconfigured`] for incomplete rules.
    pub fn lighttpd_from_rule(rule: &RuleConfig) -> Result<Self, ConfigError> {
        Self::redirect_from_rule(rule).map(Self::lighttpd)
    }

    /// Target proxy.
    #[must_use]
    pub fn backend(&self) -> ProxyBackend {
        self.backend
    }
}

#[async_trait]
impl DownloadMiddleware for XSendfileMiddleware {
    fn name(&self) -> &str {
        self.backend.as_str()
    }

    async fn process_download_response(
        &self,
        _request: &DownloadRequest,
        mut response: DownloadResponse,
    ) -> Result<Response, DownloadError> {
        let file_path = match self.redirect.redirect_url(response.file()) {
            Ok(file_path) => file_path,
            Err(no_match) => {
                debug!(%no_match, backend = %self.backend, "keeping download response");
                return Ok(Response::Download(response));
            }
        };

        let (mut headers, basename, _) = proxied_headers(&mut response, &file_path).await?;
        insert_header(&mut headers, "x-sendfile", &file_path)?;
        debug!(
            file_path = %file_path,
            backend = %self.backend,
            "delegating download to x-sendfile"
        );
        Ok(Response::Proxied(ProxiedResponse::new(
            self.backend,
            headers,
            basename,
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::files::VirtualFile;
    use crate::response::DownloadOptions;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_apache_x_sendfile() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.pdf");
        std::fs::write(&path, "%PDF").unwrap();
        let file = crate::files::LocalFile::open(&path).await.unwrap();

        let rule = RuleConfig::for_dir(temp_dir.path().to_string_lossy(), "/var/protected/");
        let middleware = XSendfileMiddleware::apache_from_rule(&rule).unwrap();
        let response = middleware
            .process_download_response(
                &DownloadRequest::default(),
                DownloadResponse::new(Box::new(file), DownloadOptions::default()),
            )
            .await
            .unwrap();

        let proxied = response.as_proxied().unwrap();
        assert_eq!(proxied.backend(), ProxyBackend::Apache);
        assert_eq!(proxied.header("x-sendfile"), Some("/var/protected/report.pdf"));
        assert_eq!(proxied.header("content-type"), Some("application/pdf; charset=utf-8"));
        assert_eq!(
            proxied.header("content-disposition"),
            Some("attachment; filename=\"report.pdf\"")
        );
    }

    #[tokio::test]
    async fn test_lighttpd_keeps_virtual_files() {
        let rule = RuleConfig::for_url("/generated/", "/var/generated/");
        let middleware = XSendfileMiddleware::lighttpd_from_rule(&rule).unwrap();
        assert_eq!(middleware.name(), "lighttpd");
        let file = VirtualFile::from_text("a.txt", "a").with_url("/generated/a.txt");
        let response = middleware
            .process_download_response(
                &DownloadRequest::default(),
                DownloadResponse::new(Box::new(file), DownloadOptions::default()),
            )
            .await
            .unwrap();
        assert!(response.as_download().is_some());
    }
}
