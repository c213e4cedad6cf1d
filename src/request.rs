//! The subset of an incoming request that views and middlewares look at.

use std::collections::HashMap;

use http::header::{HOST, IF_MODIFIED_SINCE};
use http::{HeaderMap, HeaderName, HeaderValue, Uri};

/// Incoming request as seen by the download pipeline.
///
/// `params` holds values captured by the host router (e.g. `path`, `slug`).
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
}

impl DownloadRequest {
    /// Creates a request for `uri` without headers or params.
    #[must_use]
    pub fn new(uri: Uri) -> Self {
        Self {
            uri,
            headers: HeaderMap::new(),
            params: HashMap::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds a router-captured parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Router-captured parameter `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Raw `If-Modified-Since` value, if sent.
    #[must_use]
    pub fn if_modified_since(&self) -> Option<&str> {
        self.headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
    }

    /// `scheme://host` the request was addressed to, when known.
    ///
    /// Uses the absolute URI when present, else the `Host` header over `http`.
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        if let (Some(scheme), Some(authority)) = (self.uri.scheme_str(), self.uri.authority()) {
            return Some(format!("{scheme}://{authority}"));
        }
        let host = self.headers.get(HOST)?.to_str().ok()?;
        Some(format!("http://{host}"))
    }
}

impl From<http::request::Parts> for DownloadRequest {
    fn from(parts: http::request::Parts) -> Self {
        Self {
            uri: parts.uri,
            headers: parts.headers,
            params: HashMap::new(),
        }
    }
}
