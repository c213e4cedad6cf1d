//! Backend registry: maps backend names to middleware factories.
//!
//! The [`BackendRegistry`] is how a rule's `backend` name becomes a configured
//! middleware. Defaults cover Nginx, Apache and Lighttpd; hosts may register
//! their own factories under new names or override the bundled ones.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{ConfigError, RuleConfig};
use crate::middleware::DownloadMiddleware;
use crate::proxy::{XAccelRedirectMiddleware, XSendfileMiddleware};

/// Builds a middleware from one rule.
pub type BackendFactory =
    Arc<dyn Fn(&RuleConfig) -> Result<Arc<dyn DownloadMiddleware>, ConfigError> + Send + Sync>;

/// Named middleware factories.
#[derive(Clone)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry knowing `nginx` (alias `x-accel`), `apache` and `lighttpd`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let nginx: BackendFactory = Arc::new(|rule: &RuleConfig| {
            Ok(Arc::new(XAccelRedirectMiddleware::from_rule(rule)?) as Arc<dyn DownloadMiddleware>)
        });
        registry.register_factory("nginx", Arc::clone(&nginx));
        registry.register_factory("x-accel", nginx);
        registry.register("apache", |rule| {
            Ok(Arc::new(XSendfileMiddleware::apache_from_rule(rule)?)
                as Arc<dyn DownloadMiddleware>)
        });
        registry.register("lighttpd", |rule| {
            Ok(Arc::new(XSendfileMiddleware::lighttpd_from_rule(rule)?)
                as Arc<dyn DownloadMiddleware>)
        });
        registry
    }

    /// Registers `factory` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&RuleConfig) -> Result<Arc<dyn DownloadMiddleware>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.register_factory(name, Arc::new(factory));
    }

    /// Registers a shared factory under `name`.
    pub fn register_factory(&mut self, name: impl Into<String>, factory: BackendFactory) {
        let name = name.into().to_ascii_lowercase();
        debug!(name = %name, "registering backend");
        self.factories.insert(name, factory);
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds the middleware for `rule` with backend `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Misconfigured`] for unknown backends, or the
    /// factory's own error.
    pub fn build(
        &self,
        name: &str,
        rule: &RuleConfig,
    ) -> Result<Arc<dyn DownloadMiddleware>, ConfigError> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| {
                ConfigError::misconfigured(format!(
                    "unknown backend '{name}' (known: {})",
                    self.names().join(", ")
                ))
            })?;
        factory(rule)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["apache", "lighttpd", "nginx", "x-accel"]);
        assert!(registry.contains("NGINX"));
    }

    #[test]
    fn test_unknown_backend_is_misconfigured() {
        let registry = BackendRegistry::with_defaults();
        let rule = RuleConfig::for_dir("/srv/media", "/protected");
        let error = registry.build("caddy", &rule).unwrap_err();
        let msg = error.to_string();
        assert!(msg.contains("unknown backend 'caddy'"), "unexpected: {msg}");
        assert!(msg.contains("nginx"));
    }

    #[test]
    fn test_missing_destination_is_misconfigured() {
        let registry = BackendRegistry::with_defaults();
        let rule = RuleConfig {
            source_dir: Some("/srv/media".to_string()),
            ..RuleConfig::default()
        };
        for backend in ["nginx", "apache", "lighttpd"] {
            let error = registry.build(backend, &rule).unwrap_err();
            assert!(matches!(error, ConfigError::Misconfigured { .. }), "{backend}");
        }
    }

    #[test]
    fn test_custom_backend() {
        let mut registry = BackendRegistry::new();
        registry.register("internal", |rule| {
            Ok(Arc::new(XAccelRedirectMiddleware::from_rule(rule)?) as Arc<dyn DownloadMiddleware>)
        });
        let rule = RuleConfig::for_url("/media/", "/internal/");
        assert!(registry.build("internal", &rule).is_ok());
        assert!(registry.build("nginx", &rule).is_err());
    }
}
