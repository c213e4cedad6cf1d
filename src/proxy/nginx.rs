//! Nginx X-Accel-Redirect.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ProxiedRedirect, ProxiedResponse, ProxyBackend, insert_header, proxied_headers};
use crate::config::{ConfigError, RuleConfig};
use crate::error::DownloadError;
use crate::middleware::DownloadMiddleware;
use crate::request::DownloadRequest;
use crate::response::{DownloadResponse, Response, content_type_to_charset};

/// Value of `X-Accel-Expires` or `X-Accel-Limit-Rate`: a number, or `off`.
///
/// Deserializes from an integer, `false` or `"off"`. Zero means `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "AccelSettingRepr")]
pub enum AccelSetting {
    /// Explicitly disabled.
    Off,
    /// Seconds (expires) or bytes per second (limit rate).
    Value(u64),
}

impl AccelSetting {
    /// Setting for `value`; zero disables.
    #[must_use]
    pub fn from_value(value: u64) -> Self {
        if value == 0 { Self::Off } else { Self::Value(value) }
    }
}

impl fmt::Display for AccelSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccelSettingRepr {
    Flag(bool),
    Number(u64),
    Text(String),
}

impl TryFrom<AccelSettingRepr> for AccelSetting {
    type Error = String;

    fn try_from(repr: AccelSettingRepr) -> Result<Self, Self::Error> {
        match repr {
            AccelSettingRepr::Flag(false) => Ok(Self::Off),
            AccelSettingRepr::Flag(true) => {
                Err("expected a number, false or \"off\", got true".to_string())
            }
            AccelSettingRepr::Number(value) => Ok(Self::from_value(value)),
            AccelSettingRepr::Text(text) if text.eq_ignore_ascii_case("off") => Ok(Self::Off),
            AccelSettingRepr::Text(text) => text
                .parse()
                .map(Self::from_value)
                .map_err(|_| format!("expected a number, false or \"off\", got {text:?}")),
        }
    }
}

/// Turns download responses into `X-Accel-Redirect` responses.
#[derive(Debug, Clone)]
pub struct XAccelRedirectMiddleware {
    redirect: ProxiedRedirect,
    expires: Option<AccelSetting>,
    with_buffering: Option<bool>,
    limit_rate: Option<AccelSetting>,
}

impl XAccelRedirectMiddleware {
    /// Creates a middleware without tuning headers.
    #[must_use]
    pub fn new(redirect: ProxiedRedirect) -> Self {
        Self {
            redirect: redirect.percent_encoded(),
            expires: None,
            with_buffering: None,
            limit_rate: None,
        }
    }

    /// Builds the middleware described by `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Misconfigured`] for incomplete rules.
    pub fn from_rule(rule: &RuleConfig) -> Result<Self, ConfigError> {
        let redirect = ProxiedRedirect::new(
            rule.source_dir.clone(),
            rule.source_url.clone(),
            rule.destination_url.clone(),
        )?
        .percent_encoded();
        Ok(Self {
            redirect,
            expires: rule.expires,
            with_buffering: rule.with_buffering,
            limit_rate: rule.limit_rate,
        })
    }

    /// Sets `X-Accel-Expires`.
    #[must_use]
    pub fn with_expires(mut self, expires: AccelSetting) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Sets `X-Accel-Buffering`.
    #[must_use]
    pub fn with_buffering(mut self, with_buffering: bool) -> Self {
        self.with_buffering = Some(with_buffering);
        self
    }

    /// Sets `X-Accel-Limit-Rate`.
    #[must_use]
    pub fn with_limit_rate(mut self, limit_rate: AccelSetting) -> Self {
        self.limit_rate = Some(limit_rate);
        self
    }

    /// The configured prefix mapping.
    #[must_use]
    pub fn redirect(&self) -> &ProxiedRedirect {
        &self.redirect
    }
}

#[async_trait]
impl DownloadMiddleware for XAccelRedirectMiddleware {
    fn name(&self) -> &str {
        "nginx"
    }

    async fn process_download_response(
        &self,
        _request: &DownloadRequest,
        mut response: DownloadResponse,
    ) -> Result<Response, DownloadError> {
        let redirect_url = match self.redirect.redirect_url(response.file()) {
            Ok(redirect_url) => redirect_url,
            Err(no_match) => {
                debug!(%no_match, "keeping download response");
                return Ok(Response::Download(response));
            }
        };

        let (mut headers, basename, content_type) =
            proxied_headers(&mut response, &redirect_url).await?;
        insert_header(&mut headers, "x-accel-redirect", &redirect_url)?;
        if let Some(charset) = content_type_to_charset(&content_type) {
            insert_header(&mut headers, "x-accel-charset", &charset)?;
        }
        if let Some(with_buffering) = self.with_buffering {
            let value = if with_buffering { "yes" } else { "no" };
            insert_header(&mut headers, "x-accel-buffering", value)?;
        }
        if let Some(expires) = self.expires {
            insert_header(&mut headers, "x-accel-expires", &expires.to_string())?;
        }
        if let Some(limit_rate) = self.limit_rate {
            insert_header(&mut headers, "x-accel-limit-rate", &limit_rate.to_string())?;
        }

        debug!(redirect_url = %redirect_url, "delegating download to nginx");
        Ok(Response::Proxied(ProxiedResponse::new(
            ProxyBackend::Nginx,
            headers,
            basename,
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::files::{FileSystemStorage, StorageFile};
    use crate::response::DownloadOptions;
    use std::sync::Arc;

    fn media_response(options: DownloadOptions) -> DownloadResponse {
        let storage = FileSystemStorage::new("/srv/media").with_base_url("/media/");
        let file = StorageFile::new(Arc::new(storage), "docs/é.txt");
        DownloadResponse::new(Box::new(file), options)
    }

    fn middleware() -> XAccelRedirectMiddleware {
        XAccelRedirectMiddleware::from_rule(&RuleConfig::for_url("/media/", "/proxied-download/"))
            .unwrap()
    }

    async fn proxied(
        middleware: &XAccelRedirectMiddleware,
        options: DownloadOptions,
    ) -> ProxiedResponse {
        let response = middleware
            .process_download_response(&DownloadRequest::default(), media_response(options))
            .await
            .unwrap();
        match response {
            Response::Proxied(proxied) => proxied,
            other => panic!("expected proxied response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_x_accel_headers() {
        let middleware = middleware()
            .with_buffering(false)
            .with_expires(AccelSetting::Value(3600))
            .with_limit_rate(AccelSetting::Off);
        let response = proxied(&middleware, DownloadOptions::default()).await;

        assert_eq!(response.backend(), ProxyBackend::Nginx);
        assert_eq!(
            response.header("x-accel-redirect"),
            Some("/proxied-download/docs/%C3%A9.txt")
        );
        assert_eq!(response.header("x-accel-charset"), Some("utf-8"));
        assert_eq!(response.header("x-accel-buffering"), Some("no"));
        assert_eq!(response.header("x-accel-expires"), Some("3600"));
        assert_eq!(response.header("x-accel-limit-rate"), Some("off"));
        assert_eq!(response.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(
            response.header("content-disposition"),
            Some("attachment; filename=\"e.txt\"; filename*=UTF-8''%C3%A9.txt")
        );
        assert_eq!(response.basename(), "é.txt");
    }

    #[tokio::test]
    async fn test_untuned_middleware_omits_optional_headers() {
        let response = proxied(&middleware(), DownloadOptions::inline()).await;
        assert!(response.header("x-accel-buffering").is_none());
        assert!(response.header("x-accel-expires").is_none());
        assert!(response.header("x-accel-limit-rate").is_none());
        assert!(response.header("content-disposition").is_none());
    }

    #[tokio::test]
    async fn test_charset_omitted_without_charset() {
        let options = DownloadOptions {
            content_type: Some("image/png".to_string()),
            ..DownloadOptions::default()
        };
        let response = proxied(&middleware(), options).await;
        assert!(response.header("x-accel-charset").is_none());
        assert_eq!(response.header("content-type"), Some("image/png"));
    }

    #[test]
    fn test_accel_setting_parsing() {
        #[derive(Deserialize)]
        struct Holder {
            value: AccelSetting,
        }
        let parse = |input: &str| toml::from_str::<Holder>(input).map(|holder| holder.value);
        assert_eq!(parse("value = 60").unwrap(), AccelSetting::Value(60));
        assert_eq!(parse("value = 0").unwrap(), AccelSetting::Off);
        assert_eq!(parse("value = false").unwrap(), AccelSetting::Off);
        assert_eq!(parse("value = \"OFF\"").unwrap(), AccelSetting::Off);
        assert!(parse("value = true").is_err());
        assert!(parse("value = \"soon\"").is_err());
    }
}
