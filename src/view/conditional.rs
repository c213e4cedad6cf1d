//! Conditional GET (`If-Modified-Since`) evaluation.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::trace;

/// Whole seconds since the Unix epoch (UTC). Pre-epoch times map to 0.
fn epoch_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Returns true if a file with `modified_time` and `size` changed since the
/// `If-Modified-Since` value `header` (`<HTTP-date>[; length=<n>]`).
///
/// Anything that cannot be compared counts as modified: unknown
/// modification time, unparsable header, a length that differs from (or
/// cannot be checked against) the size.
#[must_use]
pub fn was_modified_since(
    header: &str,
    modified_time: Option<SystemTime>,
    size: Option<u64>,
) -> bool {
    let Some(modified_time) = modified_time else {
        return true;
    };

    let (date, length) = match header.split_once(';') {
        Some((date, params)) => (date.trim(), Some(params.trim())),
        None => (header.trim(), None),
    };

    if let Some(params) = length {
        let expected = params
            .split_once('=')
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case("length"))
            .and_then(|(_, value)| value.trim().parse::<u64>().ok());
        match (expected, size) {
            (Some(expected), Some(size)) if expected == size => {}
            _ => {
                trace!(header, ?size, "length mismatch, treating as modified");
                return true;
            }
        }
    }

    let Ok(since) = httpdate::parse_http_date(date) else {
        trace!(header, "unparsable If-Modified-Since, treating as modified");
        return true;
    };
    epoch_seconds(modified_time) > epoch_seconds(since)
}
