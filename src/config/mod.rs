//! Declarative proxy rules, loaded from TOML or JSON.
//!
//! ```toml
//! backend = "nginx"
//!
//! [[rules]]
//! source_url = "/media/"
//! destination_url = "/proxied-download/media/"
//! expires = 3600
//!
//! [[rules]]
//! source_dir = "/srv/reports"
//! destination_url = "/srv/reports"
//! backend = "apache"
//! ```
//!
//! Configuration is validated once, when middlewares are built from it:
//! a bad rule fails at startup, never per request.

mod registry;

pub use registry::{BackendFactory, BackendRegistry};

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::proxy::AccelSetting;

/// Default backend name when the configuration does not set one.
pub const DEFAULT_BACKEND: &str = "nginx";

/// Errors raised while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings are missing or inconsistent.
    #[error("misconfigured: {message}")]
    Misconfigured {
        /// What is wrong.
        message: String,
    },

    /// The configuration file cannot be read.
    #[error("cannot read configuration {path}: {source}")]
    Read {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration cannot be parsed.
    #[error("cannot parse {format} configuration: {message}")]
    Parse {
        /// `toml` or `json`.
        format: &'static str,
        /// Parser message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a misconfiguration error.
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::Misconfigured {
            message: message.into(),
        }
    }
}

/// One proxy rule: where matching files live, and where the proxy finds them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Server-side directory prefix of matching files.
    #[serde(default)]
    pub source_dir: Option<String>,
    /// Public URL prefix of matching files.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Proxy-facing location (internal URL for Nginx, directory for X-Sendfile).
    #[serde(default, alias = "destination_dir")]
    pub destination_url: Option<String>,
    /// Backend name overriding the global default.
    #[serde(default)]
    pub backend: Option<String>,
    /// `X-Accel-Expires`: seconds, or `"off"`/`false`.
    #[serde(default)]
    pub expires: Option<AccelSetting>,
    /// `X-Accel-Buffering`.
    #[serde(default)]
    pub with_buffering: Option<bool>,
    /// `X-Accel-Limit-Rate`: bytes per second, or `"off"`/`false`.
    #[serde(default)]
    pub limit_rate: Option<AccelSetting>,
}

impl RuleConfig {
    /// Rule serving files under `source_dir` from `destination_url`.
    pub fn for_dir(source_dir: impl Into<String>, destination_url: impl Into<String>) -> Self {
        Self {
            source_dir: Some(source_dir.into()),
            destination_url: Some(destination_url.into()),
            ..Self::default()
        }
    }

    /// Rule serving files under `source_url` from `destination_url`.
    pub fn for_url(source_url: impl Into<String>, destination_url: impl Into<String>) -> Self {
        Self {
            source_url: Some(source_url.into()),
            destination_url: Some(destination_url.into()),
            ..Self::default()
        }
    }

    /// Human-readable rule description for logs and errors.
    #[must_use]
    pub fn describe(&self) -> String {
        let source = self
            .source_url
            .as_deref()
            .or(self.source_dir.as_deref())
            .unwrap_or("<no source>");
        let destination = self.destination_url.as_deref().unwrap_or("<no destination>");
        format!("{source} -> {destination}")
    }
}

/// Global backend plus the ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadViewConfig {
    /// Backend used by rules that do not name one.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Rules, applied in order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

impl Default for DownloadViewConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            rules: Vec::new(),
        }
    }
}

impl DownloadViewConfig {
    /// Parses TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid input.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|error| ConfigError::Parse {
            format: "toml",
            message: error.to_string(),
        })
    }

    /// Parses JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid input.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(input).map_err(|error| ConfigError::Parse {
            format: "json",
            message: error.to_string(),
        })
    }

    /// Loads a file; `.json` files are parsed as JSON, anything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&input)
        } else {
            Self::from_toml_str(&input)
        }
    }

    /// Backend name for `rule`.
    #[must_use]
    pub fn backend_for<'a>(&'a self, rule: &'a RuleConfig) -> &'a str {
        rule.backend.as_deref().unwrap_or(&self.backend)
    }
}
