//! Shared assertions for download and proxied responses.
//!
//! Each test binary compiles this module separately; helpers unused by one
//! binary are allowed to be dead there.

#![allow(dead_code)]

use downloadview::{ProxiedResponse, ProxyBackend, Response};
use http::StatusCode;

/// What a streamed download is expected to look like.
#[derive(Debug, Default)]
pub struct ExpectedDownload<'a> {
    pub content: &'a [u8],
    /// `None` expects an inline response (no Content-Disposition).
    pub basename: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

/// Asserts `response` is a 200 download with the expected headers, then
/// streams it and compares the body.
pub async fn assert_download_response(response: Response, expected: ExpectedDownload<'_>) {
    assert!(
        response.as_download().is_some(),
        "expected a download response, got {response:?}"
    );
    let http = response.into_http().await.expect("download renders");
    assert_eq!(http.status(), StatusCode::OK);

    let headers = http.headers();
    match expected.basename {
        Some(basename) => {
            let disposition = headers
                .get("content-disposition")
                .expect("attachment has Content-Disposition")
                .to_str()
                .expect("ASCII Content-Disposition");
            assert!(
                disposition.starts_with("attachment; filename="),
                "unexpected disposition: {disposition}"
            );
            assert!(
                disposition.contains(basename),
                "'{basename}' missing from {disposition}"
            );
        }
        None => assert!(headers.get("content-disposition").is_none()),
    }
    if let Some(content_type) = expected.content_type {
        assert_eq!(headers.get("content-type").expect("Content-Type"), content_type);
    }

    let body = http.into_body().into_bytes().await.expect("body streams");
    assert_eq!(body.as_ref(), expected.content);
}

fn proxied<'a>(response: &'a Response, backend: ProxyBackend) -> &'a ProxiedResponse {
    let proxied = response
        .as_proxied()
        .unwrap_or_else(|| panic!("expected a proxied response, got {response:?}"));
    assert_eq!(proxied.backend(), backend);
    assert_eq!(proxied.status(), StatusCode::OK);
    proxied
}

fn assert_headers(proxied: &ProxiedResponse, expected: &[(&str, &str)]) {
    for (name, value) in expected {
        assert_eq!(proxied.header(name), Some(*value), "header {name}");
    }
}

/// Asserts an Nginx response redirecting to `redirect_url`, carrying `headers`.
pub fn assert_x_accel_redirect<'a>(
    response: &'a Response,
    redirect_url: &str,
    headers: &[(&str, &str)],
) -> &'a ProxiedResponse {
    let proxied = proxied(response, ProxyBackend::Nginx);
    assert_eq!(proxied.header("x-accel-redirect"), Some(redirect_url));
    assert!(proxied.header("x-sendfile").is_none());
    assert_headers(proxied, headers);
    proxied
}

/// Asserts an X-Sendfile response for `backend` pointing at `file_path`.
pub fn assert_x_sendfile<'a>(
    response: &'a Response,
    backend: ProxyBackend,
    file_path: &str,
    headers: &[(&str, &str)],
) -> &'a ProxiedResponse {
    let proxied = proxied(response, backend);
    assert_eq!(proxied.header("x-sendfile"), Some(file_path));
    assert!(proxied.header("x-accel-redirect").is_none());
    assert_headers(proxied, headers);
    proxied
}
