//! The download response: a file plus the metadata needed to serve it.

use http::header::{CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use tracing::{debug, instrument};

use super::ResponseBody;
use super::disposition::content_disposition;
use crate::error::DownloadError;
use crate::files::{FileWrapper, name_basename};

/// Charset announced when neither the file nor the caller provides one.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// MIME type used when the basename extension is unknown.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// How a file is presented to the client.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Ask the client to save the file rather than display it.
    pub attachment: bool,
    /// Client-side file name. Defaults to the basename of the wrapper name.
    pub basename: Option<String>,
    /// Response status.
    pub status: StatusCode,
    /// Full Content-Type override.
    pub content_type: Option<String>,
    /// MIME type override, combined with the charset.
    pub file_mimetype: Option<String>,
    /// Content-Encoding override.
    pub file_encoding: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            attachment: true,
            basename: None,
            status: StatusCode::OK,
            content_type: None,
            file_mimetype: None,
            file_encoding: None,
        }
    }
}

impl DownloadOptions {
    /// Serves the file inline (no Content-Disposition).
    #[must_use]
    pub fn inline() -> Self {
        Self {
            attachment: false,
            ..Self::default()
        }
    }

    /// Sets the client-side file name.
    #[must_use]
    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }
}

/// HTTP response streaming a file.
///
/// Headers are computed on first access to [`default_headers`](Self::default_headers)
/// and cached for the lifetime of the response.
#[derive(Debug)]
pub struct DownloadResponse {
    file: Box<dyn FileWrapper>,
    options: DownloadOptions,
    headers: Option<HeaderMap>,
}

impl DownloadResponse {
    /// Wraps `file`. Nothing is read or computed yet.
    #[must_use]
    pub fn new(file: Box<dyn FileWrapper>, options: DownloadOptions) -> Self {
        Self {
            file,
            options,
            headers: None,
        }
    }

    /// The file being downloaded.
    #[must_use]
    pub fn file(&self) -> &dyn FileWrapper {
        self.file.as_ref()
    }

    /// Mutable access to the file, for metadata that requires IO.
    pub fn file_mut(&mut self) -> &mut dyn FileWrapper {
        self.file.as_mut()
    }

    /// Presentation options.
    #[must_use]
    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// True if the client is asked to save the file.
    #[must_use]
    pub fn attachment(&self) -> bool {
        self.options.attachment
    }

    /// Response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.options.status
    }

    /// Client-side file name.
    #[must_use]
    pub fn basename(&self) -> String {
        match &self.options.basename {
            Some(basename) => basename.clone(),
            None => name_basename(self.file.name()),
        }
    }

    /// MIME type: override, then the file's own, then a guess on the basename.
    #[must_use]
    pub fn mime_type(&self) -> String {
        self.options
            .file_mimetype
            .clone()
            .or_else(|| self.file.mime_type())
            .or_else(|| {
                mime_guess::from_path(self.basename())
                    .first_raw()
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
    }

    /// Content encoding, when known.
    #[must_use]
    pub fn encoding(&self) -> Option<String> {
        self.options
            .file_encoding
            .clone()
            .or_else(|| self.file.encoding())
    }

    /// Full Content-Type value.
    ///
    /// # Errors
    ///
    /// Propagates errors raised while asking the file for its content type.
    pub async fn content_type(&mut self) -> Result<String, DownloadError> {
        if let Some(content_type) = &self.options.content_type {
            return Ok(content_type.clone());
        }
        if let Some(content_type) = self.file.content_type().await? {
            return Ok(content_type);
        }
        let charset = self
            .file
            .charset()
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string());
        Ok(format!("{}; charset={charset}", self.mime_type()))
    }

    /// Headers describing the file: Content-Type, Content-Length (when the
    /// size is known), Content-Encoding (when known) and Content-Disposition
    /// (attachments only).
    ///
    /// # Errors
    ///
    /// Propagates metadata errors from the file, or
    /// [`DownloadError::InvalidHeader`] for unrepresentable values.
    #[instrument(level = "debug", skip(self), fields(name = %self.file.name()))]
    pub async fn default_headers(&mut self) -> Result<&HeaderMap, DownloadError> {
        if self.headers.is_none() {
            let headers = self.compute_headers().await?;
            debug!(count = headers.len(), "computed download headers");
            self.headers = Some(headers);
        }
        Ok(self.headers.get_or_insert_default())
    }

    async fn compute_headers(&mut self) -> Result<HeaderMap, DownloadError> {
        let mut headers = HeaderMap::new();

        let content_type = self.content_type().await?;
        headers.insert(CONTENT_TYPE, header_value("Content-Type", &content_type)?);

        if let Some(size) = self.file.size().await? {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        }

        if let Some(encoding) = self.encoding() {
            headers.insert(CONTENT_ENCODING, header_value("Content-Encoding", &encoding)?);
        }

        if self.options.attachment {
            let disposition = content_disposition(&self.basename());
            headers.insert(
                CONTENT_DISPOSITION,
                header_value("Content-Disposition", &disposition)?,
            );
        }
        Ok(headers)
    }

    /// Turns the response into an `http` response whose body streams the file.
    ///
    /// # Errors
    ///
    /// Propagates header computation errors and errors raised while opening
    /// the file. Errors while streaming surface from the body stream.
    pub async fn into_http(mut self) -> Result<http::Response<ResponseBody>, DownloadError> {
        let headers = self.default_headers().await?.clone();
        let stream = self.file.stream().await?;
        let mut response = http::Response::new(ResponseBody::from_stream(stream));
        *response.status_mut() = self.options.status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Builds a header value, reporting unrepresentable ones.
pub(crate) fn header_value(
    header: &'static str,
    value: &str,
) -> Result<HeaderValue, DownloadError> {
    HeaderValue::from_str(value).map_err(|_| DownloadError::invalid_header(header, value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::files::{VirtualFile, WithMetadata};
    use crate::io::text_chunks;

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).map(|value| value.to_str().unwrap())
    }

    #[tokio::test]
    async fn test_default_headers_for_text_file() {
        let file = VirtualFile::from_text("hello-world.txt", "Hello world!\n");
        let mut response = DownloadResponse::new(Box::new(file), DownloadOptions::default());
        let headers = response.default_headers().await.unwrap();

        assert_eq!(header(headers, "content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(header(headers, "content-length"), Some("13"));
        assert_eq!(
            header(headers, "content-disposition"),
            Some("attachment; filename=\"hello-world.txt\"")
        );
        assert!(headers.get("content-encoding").is_none());
    }

    #[tokio::test]
    async fn test_headers_are_computed_once() {
        let file = VirtualFile::from_text("a.csv", "x");
        let mut response = DownloadResponse::new(Box::new(file), DownloadOptions::default());
        let first = response.default_headers().await.unwrap().clone();
        let second = response.default_headers().await.unwrap().clone();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_size_omits_content_length() {
        let file = VirtualFile::from_stream("generated.txt", text_chunks(["a", "b"]));
        let mut response = DownloadResponse::new(Box::new(file), DownloadOptions::default());
        let headers = response.default_headers().await.unwrap();
        assert!(headers.get("content-length").is_none());
    }

    #[tokio::test]
    async fn test_inline_omits_content_disposition() {
        let file = VirtualFile::from_text("hello-world.txt", "Hello");
        let mut response = DownloadResponse::new(Box::new(file), DownloadOptions::inline());
        let headers = response.default_headers().await.unwrap();
        assert!(headers.get("content-disposition").is_none());
    }

    #[tokio::test]
    async fn test_content_type_precedence() {
        let file = VirtualFile::from_text("data.unknownext", "x");
        let mut response = DownloadResponse::new(Box::new(file), DownloadOptions::default());
        assert_eq!(
            response.content_type().await.unwrap(),
            "application/octet-stream; charset=utf-8"
        );

        let mut file = WithMetadata::new(Box::new(VirtualFile::from_text("data.txt", "x")));
        file.mime_type = Some("text/csv".to_string());
        file.charset = Some("latin-1".to_string());
        let mut response = DownloadResponse::new(Box::new(file), DownloadOptions::default());
        assert_eq!(response.content_type().await.unwrap(), "text/csv; charset=latin-1");

        let options = DownloadOptions {
            file_mimetype: Some("text/markdown".to_string()),
            ..DownloadOptions::default()
        };
        let file = VirtualFile::from_text("notes.txt", "x");
        let mut response = DownloadResponse::new(Box::new(file), options);
        assert_eq!(response.content_type().await.unwrap(), "text/markdown; charset=utf-8");

        let options = DownloadOptions {
            content_type: Some("application/json".to_string()),
            file_mimetype: Some("text/markdown".to_string()),
            ..DownloadOptions::default()
        };
        let file = VirtualFile::from_text("notes.txt", "x");
        let mut response = DownloadResponse::new(Box::new(file), options);
        assert_eq!(response.content_type().await.unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_encoding_header() {
        let options = DownloadOptions {
            file_encoding: Some("gzip".to_string()),
            ..DownloadOptions::default()
        };
        let file = VirtualFile::from_bytes("archive.tar.gz", &b"\x1f\x8b"[..]);
        let mut response = DownloadResponse::new(Box::new(file), options);
        let headers = response.default_headers().await.unwrap();
        assert_eq!(header(headers, "content-encoding"), Some("gzip"));
    }

    #[tokio::test]
    async fn test_basename_override() {
        let file = VirtualFile::from_text("/srv/media/abc123", "x");
        let options = DownloadOptions::default().with_basename("é.txt");
        let mut response = DownloadResponse::new(Box::new(file), options);
        assert_eq!(response.basename(), "é.txt");
        let headers = response.default_headers().await.unwrap();
        assert_eq!(
            header(headers, "content-disposition"),
            Some("attachment; filename=\"e.txt\"; filename*=UTF-8''%C3%A9.txt")
        );
    }

    #[tokio::test]
    async fn test_into_http_streams_body() {
        let file = VirtualFile::from_text("hello-world.txt", "Hello world!\n");
        let response = DownloadResponse::new(Box::new(file), DownloadOptions::default());
        let http_response = response.into_http().await.unwrap();
        assert_eq!(http_response.status(), StatusCode::OK);
        assert_eq!(
            header(http_response.headers(), "content-type"),
            Some("text/plain; charset=utf-8")
        );
        let body = http_response.into_body().into_bytes().await.unwrap();
        assert_eq!(body, &b"Hello world!\n"[..]);
    }
}
