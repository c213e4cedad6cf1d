//! Serving a file attached to a record (database row, document, ...).
//!
//! Persistence is the host's business: a [`RecordSource`] fetches the record
//! for a request, and the [`Record`] exposes its fields by name.

use std::time::SystemTime;

use async_trait::async_trait;

use super::{FileResolver, ResolvedFile};
use crate::error::DownloadError;
use crate::files::{FileWrapper, WithMetadata};
use crate::request::DownloadRequest;

/// Read access to the fields of a record.
pub trait Record: Send + Sync {
    /// File stored in `field`, `None` when the field is empty.
    fn file(&self, field: &str) -> Option<Box<dyn FileWrapper>>;

    /// Text value of `field`.
    fn text(&self, _field: &str) -> Option<String> {
        None
    }

    /// Timestamp value of `field`.
    fn timestamp(&self, _field: &str) -> Option<SystemTime> {
        None
    }

    /// Integer value of `field`.
    fn integer(&self, _field: &str) -> Option<u64> {
        None
    }
}

/// Fetches the record a request refers to (typically by slug or id).
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Record type.
    type Record: Record;

    /// Returns the record, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Propagates storage/database errors.
    async fn fetch(&self, request: &DownloadRequest) -> Result<Option<Self::Record>, DownloadError>;
}

/// Names of the record fields holding the file and its metadata.
#[derive(Debug, Clone)]
pub struct ObjectFields {
    /// Field holding the file.
    pub file: String,
    /// Field holding the client-side name.
    pub basename: Option<String>,
    /// Field holding the content encoding.
    pub encoding: Option<String>,
    /// Field holding the MIME type.
    pub mime_type: Option<String>,
    /// Field holding the charset.
    pub charset: Option<String>,
    /// Field holding the modification time.
    pub modification_time: Option<String>,
    /// Field holding the size.
    pub size: Option<String>,
}

impl Default for ObjectFields {
    fn default() -> Self {
        Self {
            file: "file".to_string(),
            basename: None,
            encoding: None,
            mime_type: None,
            charset: None,
            modification_time: None,
            size: None,
        }
    }
}

/// Resolves the file stored in a record field.
#[derive(Debug)]
pub struct ObjectResolver<S> {
    source: S,
    fields: ObjectFields,
}

impl<S: RecordSource> ObjectResolver<S> {
    /// Reads the file from the `file` field of records fetched by `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            fields: ObjectFields::default(),
        }
    }

    /// Replaces the field mapping.
    #[must_use]
    pub fn with_fields(mut self, fields: ObjectFields) -> Self {
        self.fields = fields;
        self
    }
}

fn field_text(record: &impl Record, field: Option<&String>) -> Option<String> {
    field.and_then(|field| record.text(field))
}

#[async_trait]
impl<S: RecordSource> FileResolver for ObjectResolver<S> {
    async fn get_file(&self, request: &DownloadRequest) -> Result<ResolvedFile, DownloadError> {
        let record = self.source.fetch(request).await?.ok_or_else(|| {
            DownloadError::file_not_found(format!("no record for {}", request.uri()))
        })?;
        let file = record.file(&self.fields.file).ok_or_else(|| {
            DownloadError::file_not_found(format!("field '{}' is empty", self.fields.file))
        })?;

        let mut with_metadata = WithMetadata::new(file);
        with_metadata.mime_type = field_text(&record, self.fields.mime_type.as_ref());
        with_metadata.encoding = field_text(&record, self.fields.encoding.as_ref());
        with_metadata.charset = field_text(&record, self.fields.charset.as_ref());
        with_metadata.modified_time = self
            .fields
            .modification_time
            .as_ref()
            .and_then(|field| record.timestamp(field));
        with_metadata.size = self
            .fields
            .size
            .as_ref()
            .and_then(|field| record.integer(field));

        let file = if with_metadata.is_empty() {
            with_metadata.into_inner()
        } else {
            Box::new(with_metadata)
        };
        let mut resolved = ResolvedFile::from_boxed(file);
        resolved.basename = field_text(&record, self.fields.basename.as_ref());
        Ok(resolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::files::VirtualFile;

    #[derive(Default)]
    struct Document {
        content: Option<&'static str>,
        text: HashMap<&'static str, String>,
    }

    impl Record for Document {
        fn file(&self, field: &str) -> Option<Box<dyn FileWrapper>> {
            let content = self.content.filter(|_| field == "file")?;
            Some(Box::new(VirtualFile::from_text("stored/abc123", content)))
        }

        fn text(&self, field: &str) -> Option<String> {
            self.text.get(field).cloned()
        }

        fn timestamp(&self, field: &str) -> Option<SystemTime> {
            (field == "updated").then(|| UNIX_EPOCH + Duration::from_secs(1_000))
        }
    }

    struct Documents(Option<fn() -> Document>);

    #[async_trait]
    impl RecordSource for Documents {
        type Record = Document;

        async fn fetch(
            &self,
            _request: &DownloadRequest,
        ) -> Result<Option<Document>, DownloadError> {
            Ok(self.0.map(|build| build()))
        }
    }

    #[tokio::test]
    async fn test_reads_file_and_metadata_fields() {
        let source = Documents(Some(|| Document {
            content: Some("a,b\n"),
            text: HashMap::from([
                ("slug", "report.csv".to_string()),
                ("mime", "text/csv".to_string()),
            ]),
        }));
        let resolver = ObjectResolver::new(source).with_fields(ObjectFields {
            basename: Some("slug".to_string()),
            mime_type: Some("mime".to_string()),
            modification_time: Some("updated".to_string()),
            ..ObjectFields::default()
        });

        let mut resolved = resolver.get_file(&DownloadRequest::default()).await.unwrap();
        assert_eq!(resolved.basename.as_deref(), Some("report.csv"));
        assert_eq!(resolved.file.mime_type().as_deref(), Some("text/csv"));
        assert_eq!(
            resolved.file.modified_time().await.unwrap(),
            Some(UNIX_EPOCH + Duration::from_secs(1_000))
        );
        assert_eq!(resolved.file.read(None).await.unwrap(), &b"a,b\n"[..]);
    }

    #[tokio::test]
    async fn test_empty_field_is_not_found() {
        let resolver = ObjectResolver::new(Documents(Some(Document::default)));
        let error = resolver
            .get_file(&DownloadRequest::default())
            .await
            .unwrap_err();
        assert!(error.is_not_found());
        assert!(error.to_string().contains("field 'file' is empty"));
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let resolver = ObjectResolver::new(Documents(None));
        let error = resolver
            .get_file(&DownloadRequest::default())
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }
}
