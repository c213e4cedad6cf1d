//! Proxying files from a remote HTTP server.

use async_trait::async_trait;
use reqwest::Client;

use super::{FileResolver, ResolvedFile};
use crate::error::DownloadError;
use crate::files::{FileWrapper, HttpFile, HttpFileOptions};
use crate::request::DownloadRequest;

/// Router parameter read when no static URL is configured.
pub const DEFAULT_URL_PARAM: &str = "url";

/// Resolves a remote file. The upstream Content-Type is served as is.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    url: Option<String>,
    param: String,
    options: HttpFileOptions,
}

impl HttpResolver {
    /// Always proxies `url`. Relative URLs are resolved against the request.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: Some(url.into()),
            param: DEFAULT_URL_PARAM.to_string(),
            options: HttpFileOptions::default(),
        }
    }

    /// Proxies the URL captured by the router as `param`.
    pub fn from_param(param: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: None,
            param: param.into(),
            options: HttpFileOptions::default(),
        }
    }

    /// Shares an existing client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Sets upstream request options.
    #[must_use]
    pub fn with_options(mut self, options: HttpFileOptions) -> Self {
        self.options = options;
        self
    }

    /// Absolute URL to fetch for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::FileNotFound`] if no URL is available.
    pub fn get_url(&self, request: &DownloadRequest) -> Result<String, DownloadError> {
        let url = match &self.url {
            Some(url) => url.clone(),
            None => request
                .param(&self.param)
                .map(str::to_string)
                .ok_or_else(|| {
                    DownloadError::file_not_found(format!("missing '{}' parameter", self.param))
                })?,
        };
        if url.starts_with('/')
            && let Some(base_url) = request.base_url()
        {
            return Ok(format!("{base_url}{url}"));
        }
        Ok(url)
    }
}

#[async_trait]
impl FileResolver for HttpResolver {
    async fn get_file(&self, request: &DownloadRequest) -> Result<ResolvedFile, DownloadError> {
        let url = self.get_url(request)?;
        let mut file =
            HttpFile::with_client(self.client.clone(), url).with_options(self.options.clone());
        // Issue the GET now so an upstream 404 becomes ours.
        file.size().await?;
        Ok(ResolvedFile::new(file))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use http::header::HOST;
    use http::{HeaderValue, Uri};

    use super::*;

    #[test]
    fn test_relative_url_uses_request_host() {
        let resolver = HttpResolver::new("/static/hello-world.txt");
        let request = DownloadRequest::new(Uri::from_static("/proxy/"))
            .with_header(HOST, HeaderValue::from_static("testserver"));
        assert_eq!(
            resolver.get_url(&request).unwrap(),
            "http://testserver/static/hello-world.txt"
        );
    }

    #[test]
    fn test_absolute_url_is_kept() {
        let resolver = HttpResolver::from_param("url");
        let request = DownloadRequest::default().with_param("url", "https://example.com/a.txt");
        assert_eq!(resolver.get_url(&request).unwrap(), "https://example.com/a.txt");
    }
}
