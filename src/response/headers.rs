//! Helpers shared by download and proxied responses.

use std::sync::LazyLock;

use regex::Regex;

/// Matches the charset parameter of a Content-Type value.
#[allow(clippy::expect_used)]
static CHARSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Regex::new(r"(?i)charset=([^;]+)").expect("charset regex is valid")
});

/// Extracts the charset of a Content-Type value, if any.
///
/// ```
/// use downloadview::response::content_type_to_charset;
///
/// assert_eq!(content_type_to_charset("text/plain; charset=utf-8").as_deref(), Some("utf-8"));
/// assert_eq!(content_type_to_charset("image/png"), None);
/// ```
#[must_use]
pub fn content_type_to_charset(content_type: &str) -> Option<String> {
    CHARSET_PATTERN
        .captures(content_type)
        .and_then(|captures| captures.get(1))
        .map(|charset| charset.as_str().trim().trim_matches('"').to_string())
        .filter(|charset| !charset.is_empty())
}

/// Last non-empty segment of a `/`-separated path or URL.
#[must_use]
pub fn url_basename(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}
