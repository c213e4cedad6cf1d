//! Error types for file wrappers, responses and views.
//!
//! Capability gaps (unknown size, no modification time, no URL) are not
//! errors: they surface as `None`. The variants below are real failures.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving, inspecting or streaming a file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The requested file (or model field) does not exist.
    ///
    /// Views turn this into a 404 response.
    #[error("file not found: {what}")]
    FileNotFound {
        /// Human-readable description of what was looked up.
        what: String,
    },

    /// File system error while opening or reading a file.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Network-level error while fetching a remote file.
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with an error status (other than 404).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL being fetched.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The file content was already handed out; streams are not restartable.
    #[error("content of '{name}' was already consumed")]
    AlreadyConsumed {
        /// Name of the file wrapper.
        name: String,
    },

    /// A storage backend failed for a reason other than a missing file.
    #[error("storage error for '{name}': {message}")]
    Storage {
        /// Storage-relative name of the file.
        name: String,
        /// Backend-provided description.
        message: String,
    },

    /// A computed header value cannot be represented on the wire.
    #[error("invalid value for header {header}: {value:?}")]
    InvalidHeader {
        /// Header name.
        header: &'static str,
        /// Offending value.
        value: String,
    },
}

impl DownloadError {
    /// Creates a file-not-found error.
    pub fn file_not_found(what: impl Into<String>) -> Self {
        Self::FileNotFound { what: what.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an already-consumed error.
    pub fn already_consumed(name: impl Into<String>) -> Self {
        Self::AlreadyConsumed { name: name.into() }
    }

    /// Creates a storage error.
    pub fn storage(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid header error.
    pub fn invalid_header(header: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidHeader {
            header,
            value: value.into(),
        }
    }

    /// Maps an IO error to [`DownloadError::FileNotFound`] when the file is
    /// missing, and to [`DownloadError::Io`] otherwise.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::file_not_found(format!("'{}' does not exist", path.display()))
        } else {
            Self::io(path, source)
        }
    }

    /// Returns true if this error means "there is nothing to serve".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }
}

// Note: no `From<std::io::Error>` / `From<reqwest::Error>`. Every variant needs
// the path or URL, so callers go through the constructors above.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_display() {
        let error = DownloadError::file_not_found("field 'file' on record 42 is empty");
        let msg = error.to_string();
        assert!(msg.starts_with("file not found"), "unexpected: {msg}");
        assert!(msg.contains("record 42"), "Expected context in: {msg}");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_from_io_not_found_maps_to_file_not_found() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error = DownloadError::from_io("/srv/media/missing.txt", io_error);
        assert!(error.is_not_found());
        assert!(error.to_string().contains("/srv/media/missing.txt"));
    }

    #[test]
    fn test_from_io_other_kind_stays_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = DownloadError::from_io("/srv/media/secret.txt", io_error);
        assert!(!error.is_not_found());
        assert!(matches!(error, DownloadError::Io { .. }));
    }

    #[test]
    fn test_http_status_display() {
        let error = DownloadError::http_status("https://example.com/a.pdf", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("https://example.com/a.pdf"));
    }

    #[test]
    fn test_already_consumed_display() {
        let error = DownloadError::already_consumed("hello-world.txt");
        assert!(error.to_string().contains("hello-world.txt"));
    }

    #[test]
    fn test_invalid_header_display() {
        let error = DownloadError::invalid_header("Content-Type", "text/plain\n");
        assert!(error.to_string().contains("Content-Type"));
    }
}
