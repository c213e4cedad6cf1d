//! Content-Disposition values with RFC 5987 dual encoding.
//!
//! Clients that understand `filename*` get the exact UTF-8 basename; the
//! others fall back to an ASCII approximation in `filename`.

use unicode_normalization::UnicodeNormalization;

/// ASCII fallback of `basename`: NFKD decomposition, non-ASCII dropped,
/// whitespace replaced by `_`.
#[must_use]
pub fn encode_basename_ascii(basename: &str) -> String {
    basename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
        .collect()
}

/// Percent-encoded UTF-8 form of `basename`.
#[must_use]
pub fn encode_basename_utf8(basename: &str) -> String {
    urlencoding::encode(basename).into_owned()
}

/// Escapes `"` and `\` for use inside a quoted-string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted
}

/// Builds the `Content-Disposition` value of an attachment named `basename`.
///
/// ```
/// use downloadview::response::content_disposition;
///
/// assert_eq!(content_disposition("hello-world.txt"), r#"attachment; filename="hello-world.txt""#);
/// assert_eq!(
///     content_disposition("é.txt"),
///     r#"attachment; filename="e.txt"; filename*=UTF-8''%C3%A9.txt"#
/// );
/// ```
#[must_use]
pub fn content_disposition(basename: &str) -> String {
    if basename.is_empty() {
        return "attachment".to_string();
    }
    let ascii = encode_basename_ascii(basename);
    let utf8 = encode_basename_utf8(basename);
    if ascii == utf8 {
        format!("attachment; filename=\"{}\"", quote(&ascii))
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{utf8}",
            quote(&ascii)
        )
    }
}
