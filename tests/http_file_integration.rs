//! Integration tests for proxying remote files over HTTP.

mod support;

use downloadview::{
    DownloadError, DownloadRequest, DownloadView, FileWrapper, HttpFile, HttpResolver,
};
use http::header::HOST;
use http::{HeaderValue, StatusCode, Uri};
use support::{ExpectedDownload, assert_download_response};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HELLO: &str = "Hello world!\n";

async fn upstream() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/static/hello-world.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(HELLO, "text/plain; charset=iso-8859-1"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/broken.txt"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    server
}

fn request() -> DownloadRequest {
    DownloadRequest::new(Uri::from_static("/proxy/hello-world.txt"))
}

#[tokio::test]
async fn test_remote_metadata_comes_from_upstream() {
    let server = upstream().await;
    let mut file = HttpFile::new(format!("{}/static/hello-world.txt", server.uri()));

    assert_eq!(file.name(), "hello-world.txt");
    assert_eq!(file.size().await.expect("size"), Some(13));
    assert_eq!(
        file.content_type().await.expect("content type").as_deref(),
        Some("text/plain; charset=iso-8859-1")
    );
    let content = file.read(None).await.expect("read");
    assert_eq!(content.as_ref(), HELLO.as_bytes());
}

#[tokio::test]
async fn test_remote_file_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/once.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("once"))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = HttpFile::new(format!("{}/once.txt", server.uri()));
    file.size().await.expect("size");
    file.content_type().await.expect("content type");
    assert_eq!(file.read(None).await.expect("read").as_ref(), b"once");
}

#[tokio::test]
async fn test_view_streams_upstream_content_type() {
    let server = upstream().await;
    let view = DownloadView::new(HttpResolver::new(format!(
        "{}/static/hello-world.txt",
        server.uri()
    )));

    let response = view.render(&request()).await.expect("render");
    assert_download_response(
        response,
        ExpectedDownload {
            content: HELLO.as_bytes(),
            basename: Some("hello-world.txt"),
            content_type: Some("text/plain; charset=iso-8859-1"),
        },
    )
    .await;
}

#[tokio::test]
async fn test_relative_url_resolves_against_request_host() {
    let server = upstream().await;
    let host = HeaderValue::from_str(&server.address().to_string()).expect("host header");
    let view = DownloadView::new(HttpResolver::new("/static/hello-world.txt"));

    let response = view
        .render(&request().with_header(HOST, host))
        .await
        .expect("render");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upstream_404_is_404() {
    let server = upstream().await;
    let view = DownloadView::new(HttpResolver::from_param("url"));
    let request = request().with_param("url", format!("{}/static/missing.txt", server.uri()));

    let response = view.render(&request).await.expect("render");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upstream_failure_propagates() {
    let server = upstream().await;
    let view = DownloadView::new(HttpResolver::new(format!(
        "{}/static/broken.txt",
        server.uri()
    )));

    let error = view.render(&request()).await.expect_err("503 propagates");
    assert!(
        matches!(error, DownloadError::HttpStatus { status: 503, .. }),
        "unexpected: {error:?}"
    );
}

#[tokio::test]
async fn test_upstream_failure_is_not_forgotten() {
    let server = upstream().await;
    let mut file = HttpFile::new(format!("{}/static/broken.txt", server.uri()));

    for attempt in 0..2 {
        let error = file.size().await.expect_err("503 on every access");
        assert!(
            matches!(error, DownloadError::HttpStatus { status: 503, .. }),
            "attempt {attempt}: {error:?}"
        );
    }
    assert!(file.content_type().await.is_err());
    let error = file.stream().await.err().expect("stream after failure");
    assert!(
        matches!(error, DownloadError::HttpStatus { status: 503, .. }),
        "unexpected: {error:?}"
    );
}
