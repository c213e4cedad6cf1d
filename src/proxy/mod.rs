//! Reverse-proxy offload: Nginx X-Accel-Redirect, Apache and Lighttpd X-Sendfile.
//!
//! A [`ProxiedRedirect`] maps a file's server-side location (public URL or
//! path) onto the location the proxy serves it from. Files that match no
//! configured prefix are left alone: the download response is streamed by the
//! application as usual.

mod nginx;
mod sendfile;

pub use nginx::{AccelSetting, XAccelRedirectMiddleware};
pub use sendfile::XSendfileMiddleware;

use std::fmt;
use std::path::Path;

use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, StatusCode};
use thiserror::Error;

use crate::config::ConfigError;
use crate::error::DownloadError;
use crate::files::FileWrapper;
use crate::response::{
    DownloadResponse, ResponseBody, content_disposition, header_value, url_basename,
};

/// The file is not under any source this redirect knows about.
///
/// Recoverable: the original download response is kept.
#[derive(Debug, Error)]
#[error("no redirection rule matches '{location}'")]
pub struct NoRedirectionMatch {
    /// URL or name of the file.
    pub location: String,
}

/// Server a proxied response is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyBackend {
    /// Nginx, via `X-Accel-Redirect`.
    Nginx,
    /// Apache `mod_xsendfile`.
    Apache,
    /// Lighttpd, via `X-Sendfile`.
    Lighttpd,
}

impl ProxyBackend {
    /// Lowercase backend name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nginx => "nginx",
            Self::Apache => "apache",
            Self::Lighttpd => "lighttpd",
        }
    }
}

impl fmt::Display for ProxyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Empty response telling the proxy which file to serve.
#[derive(Debug)]
pub struct ProxiedResponse {
    backend: ProxyBackend,
    status: StatusCode,
    headers: HeaderMap,
    basename: String,
}

impl ProxiedResponse {
    /// Creates a 200 response with `headers`.
    #[must_use]
    pub fn new(backend: ProxyBackend, headers: HeaderMap, basename: impl Into<String>) -> Self {
        Self {
            backend,
            status: StatusCode::OK,
            headers,
            basename: basename.into(),
        }
    }

    /// Target proxy.
    #[must_use]
    pub fn backend(&self) -> ProxyBackend {
        self.backend
    }

    /// Response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of header `name` as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Client-side file name.
    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Converts into a bodiless `http` response.
    #[must_use]
    pub fn into_http(self) -> http::Response<ResponseBody> {
        let mut response = http::Response::new(ResponseBody::empty());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Prefix mapping from a file's location to the proxy's location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxiedRedirect {
    source_dir: Option<String>,
    source_url: Option<String>,
    destination: String,
    percent_encode: bool,
}

impl ProxiedRedirect {
    /// Creates a redirect.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Misconfigured`] without a destination, or when
    /// neither `source_dir` nor `source_url` is set.
    pub fn new(
        source_dir: Option<String>,
        source_url: Option<String>,
        destination: Option<String>,
    ) -> Result<Self, ConfigError> {
        let destination = destination
            .filter(|destination| !destination.is_empty())
            .ok_or_else(|| ConfigError::misconfigured("destination_url is required"))?;
        let source_dir = source_dir.filter(|dir| !dir.is_empty());
        let source_url = source_url.filter(|url| !url.is_empty());
        if source_dir.is_none() && source_url.is_none() {
            return Err(ConfigError::misconfigured(format!(
                "rule for '{destination}' needs source_dir or source_url"
            )));
        }
        Ok(Self {
            source_dir,
            source_url,
            destination,
            percent_encode: false,
        })
    }

    /// Percent-encodes each segment taken from a `source_dir` match, so the
    /// result is a URL path like the ones produced by `source_url` matches.
    #[must_use]
    pub fn percent_encoded(mut self) -> Self {
        self.percent_encode = true;
        self
    }

    /// Proxy-facing prefix.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// True if `file` has a location a proxy could serve.
    #[must_use]
    pub fn claims(file: &dyn FileWrapper) -> bool {
        !file.is_virtual() && (file.url().is_some() || !file.name().is_empty())
    }

    /// Computes the proxy-facing location of `file`.
    ///
    /// # Errors
    ///
    /// Returns [`NoRedirectionMatch`] if the file is virtual or lies outside
    /// every configured source.
    pub fn redirect_url(&self, file: &dyn FileWrapper) -> Result<String, NoRedirectionMatch> {
        let no_match = || NoRedirectionMatch {
            location: file.url().unwrap_or_else(|| file.name().to_string()),
        };
        if !Self::claims(file) {
            return Err(no_match());
        }
        self.relative_path(file)
            .map(|relative| join_url(&self.destination, &relative))
            .ok_or_else(no_match)
    }

    fn relative_path(&self, file: &dyn FileWrapper) -> Option<String> {
        if let (Some(source_url), Some(url)) = (&self.source_url, file.url())
            && let Some(relative) = url.strip_prefix(source_url.as_str())
        {
            return Some(relative.to_string());
        }
        let source_dir = self.source_dir.as_deref()?;
        let located = file.local_path();
        let relative = located
            .as_deref()
            .and_then(|path| path.strip_prefix(source_dir).ok())
            .or_else(|| Path::new(file.name()).strip_prefix(source_dir).ok())?;
        let segments: Vec<String> = relative
            .components()
            .map(|component| {
                let segment = component.as_os_str().to_string_lossy();
                if self.percent_encode {
                    urlencoding::encode(&segment).into_owned()
                } else {
                    segment.into_owned()
                }
            })
            .collect();
        Some(segments.join("/"))
    }
}

/// Joins `relative` onto `base` with exactly one `/` at the seam.
fn join_url(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Headers shared by every proxied response: Content-Type, and
/// Content-Disposition for attachments. Returns them with the basename.
pub(crate) async fn proxied_headers(
    response: &mut DownloadResponse,
    redirect_url: &str,
) -> Result<(HeaderMap, String, String), DownloadError> {
    let content_type = response.content_type().await?;
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, header_value("Content-Type", &content_type)?);

    let basename = Some(response.basename())
        .filter(|basename| !basename.is_empty())
        .or_else(|| url_basename(redirect_url))
        .unwrap_or_default();
    if response.attachment() {
        headers.insert(
            CONTENT_DISPOSITION,
            header_value("Content-Disposition", &content_disposition(&basename))?,
        );
    }
    Ok((headers, basename, content_type))
}

/// Inserts a custom header, validating the value.
pub(crate) fn insert_header(
    headers: &mut HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), DownloadError> {
    headers.insert(HeaderName::from_static(name), header_value(name, value)?);
    Ok(())
}
