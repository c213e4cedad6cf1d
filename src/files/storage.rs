//! Storage backends and files living in them.
//!
//! [`Storage`] is the collaborator interface for anything that stores files
//! under string keys (local media directory, object store, ...).
//! [`FileSystemStorage`] is the bundled implementation over a local directory.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use super::FileWrapper;
use crate::error::DownloadError;
use crate::io::{ByteStream, LazyContent};

/// Trait implemented by storage backends.
///
/// Names are storage-relative keys, such as `reports/2024/q1.pdf`.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Opens `name` for streaming.
    async fn open(&self, name: &str) -> Result<ByteStream, DownloadError>;

    /// Returns true if `name` exists.
    async fn exists(&self, name: &str) -> Result<bool, DownloadError>;

    /// Size of `name` in bytes, `None` if the backend cannot tell.
    async fn size(&self, name: &str) -> Result<Option<u64>, DownloadError>;

    /// Last modification time of `name`, `None` if the backend cannot tell.
    async fn modified_time(&self, name: &str) -> Result<Option<SystemTime>, DownloadError>;

    /// Public URL of `name`, if the storage is exposed over HTTP.
    fn url(&self, name: &str) -> Option<String>;

    /// Local filesystem path of `name`, if the storage is disk-backed.
    fn path(&self, name: &str) -> Option<PathBuf>;

    /// Deletes `name`. Deleting a missing file is not an error.
    async fn delete(&self, name: &str) -> Result<(), DownloadError>;

    /// Saves `content` under `name` and returns the stored name.
    async fn save(&self, name: &str, content: Bytes) -> Result<String, DownloadError>;
}

/// Storage over a local directory, optionally published under a base URL.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    location: PathBuf,
    base_url: Option<String>,
}

impl FileSystemStorage {
    /// Creates a storage rooted at `location`.
    #[must_use]
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            base_url: None,
        }
    }

    /// Publishes stored files under `base_url` (e.g. `/media/`).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Root directory of the storage.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Maps a storage name to a path under the location.
    ///
    /// Names that would escape the location (absolute paths, `..`) are
    /// reported as not found.
    fn resolve(&self, name: &str) -> Result<PathBuf, DownloadError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(DownloadError::file_not_found(format!(
                "'{name}' is outside of storage location"
            )));
        }
        Ok(self.location.join(relative))
    }
}

#[async_trait]
impl Storage for FileSystemStorage {
    async fn open(&self, name: &str) -> Result<ByteStream, DownloadError> {
        let path = self.resolve(name)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|source| DownloadError::from_io(&path, source))?;
        Ok(ReaderStream::new(file).boxed())
    }

    async fn exists(&self, name: &str) -> Result<bool, DownloadError> {
        let Ok(path) = self.resolve(name) else {
            return Ok(false);
        };
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(DownloadError::io(path, source)),
        }
    }

    async fn size(&self, name: &str) -> Result<Option<u64>, DownloadError> {
        let path = self.resolve(name)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| DownloadError::from_io(&path, source))?;
        Ok(Some(metadata.len()))
    }

    async fn modified_time(&self, name: &str) -> Result<Option<SystemTime>, DownloadError> {
        let path = self.resolve(name)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| DownloadError::from_io(&path, source))?;
        Ok(metadata.modified().ok())
    }

    fn url(&self, name: &str) -> Option<String> {
        let base_url = self.base_url.as_deref()?;
        let encoded: Vec<String> = name
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        Some(format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            encoded.join("/")
        ))
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.resolve(name).ok()
    }

    async fn delete(&self, name: &str) -> Result<(), DownloadError> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DownloadError::io(path, source)),
        }
    }

    #[instrument(level = "debug", skip(self, content), fields(bytes = content.len()))]
    async fn save(&self, name: &str, content: Bytes) -> Result<String, DownloadError> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DownloadError::io(parent, source))?;
        }
        tokio::fs::write(&path, &content)
            .await
            .map_err(|source| DownloadError::io(&path, source))?;
        debug!(path = %path.display(), "saved file to storage");
        Ok(name.to_string())
    }
}

/// A file in a [`Storage`], addressed by its storage-relative name.
pub struct StorageFile {
    storage: Arc<dyn Storage>,
    name: String,
    content: LazyContent,
}

impl StorageFile {
    /// Wraps `name` in `storage`. Nothing is opened yet.
    pub fn new(storage: Arc<dyn Storage>, name: impl Into<String>) -> Self {
        Self {
            storage,
            name: name.into(),
            content: LazyContent::default(),
        }
    }

    /// Storage the file belongs to.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Local filesystem path, if the storage is disk-backed.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.storage.path(&self.name)
    }

    /// Returns true if the file exists in the storage.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn exists(&self) -> Result<bool, DownloadError> {
        self.storage.exists(&self.name).await
    }

    /// Deletes the file from the storage.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn delete(&self) -> Result<(), DownloadError> {
        self.storage.delete(&self.name).await
    }

    /// Replaces the file content.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn save(&self, content: Bytes) -> Result<String, DownloadError> {
        self.storage.save(&self.name, content).await
    }
}

impl fmt::Debug for StorageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageFile")
            .field("storage", &self.storage)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FileWrapper for StorageFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> Option<String> {
        self.storage.url(&self.name)
    }

    fn local_path(&self) -> Option<PathBuf> {
        self.storage.path(&self.name)
    }

    async fn size(&mut self) -> Result<Option<u64>, DownloadError> {
        self.storage.size(&self.name).await
    }

    async fn modified_time(&mut self) -> Result<Option<SystemTime>, DownloadError> {
        self.storage.modified_time(&self.name).await
    }

    async fn open(&mut self) -> Result<ByteStream, DownloadError> {
        self.storage.open(&self.name).await
    }

    fn content(&mut self) -> &mut LazyContent {
        &mut self.content
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::io::collect;
    use tempfile::TempDir;

    fn storage_with_file(name: &str, content: &[u8]) -> (TempDir, Arc<dyn Storage>) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        let storage = FileSystemStorage::new(temp_dir.path()).with_base_url("/media/");
        (temp_dir, Arc::new(storage))
    }

    #[tokio::test]
    async fn test_storage_file_proxies_to_storage() {
        let (temp_dir, storage) = storage_with_file("docs/hello-world.txt", b"Hello world!\n");
        let mut file = StorageFile::new(storage, "docs/hello-world.txt");

        assert_eq!(file.name(), "docs/hello-world.txt");
        assert_eq!(file.url().as_deref(), Some("/media/docs/hello-world.txt"));
        assert_eq!(
            file.path(),
            Some(temp_dir.path().join("docs/hello-world.txt"))
        );
        assert_eq!(file.local_path(), file.path());
        assert!(file.exists().await.unwrap());
        assert_eq!(file.size().await.unwrap(), Some(13));
        assert!(file.modified_time().await.unwrap().is_some());

        let content = collect(file.stream().await.unwrap()).await.unwrap();
        assert_eq!(content, &b"Hello world!\n"[..]);
    }

    #[tokio::test]
    async fn test_storage_url_is_percent_encoded() {
        let storage =
            FileSystemStorage::new("/srv/media").with_base_url("https://cdn.example.com/media");
        assert_eq!(
            storage.url("a dir/é.txt").as_deref(),
            Some("https://cdn.example.com/media/a%20dir/%C3%A9.txt")
        );
    }

    #[test]
    fn test_storage_without_base_url_has_no_url() {
        let storage = FileSystemStorage::new("/srv/media");
        assert!(storage.url("hello.txt").is_none());
    }

    #[tokio::test]
    async fn test_storage_rejects_escaping_names() {
        let (_temp_dir, storage) = storage_with_file("hello.txt", b"x");
        for name in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            assert!(!storage.exists(name).await.unwrap(), "{name} should not exist");
            let error = storage.open(name).await.err().unwrap();
            assert!(error.is_not_found(), "{name}: unexpected error {error}");
            assert!(storage.path(name).is_none());
        }
    }

    #[tokio::test]
    async fn test_storage_save_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileSystemStorage::new(temp_dir.path()));
        let file = StorageFile::new(Arc::clone(&storage), "nested/new.txt");

        assert!(!file.exists().await.unwrap());
        let saved = file.save(Bytes::from_static(b"fresh")).await.unwrap();
        assert_eq!(saved, "nested/new.txt");
        assert!(file.exists().await.unwrap());
        assert_eq!(storage.size("nested/new.txt").await.unwrap(), Some(5));

        file.delete().await.unwrap();
        assert!(!file.exists().await.unwrap());
        // Deleting twice is fine.
        file.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_storage_missing_file_size_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(temp_dir.path());
        let error = storage.size("missing.txt").await.unwrap_err();
        assert!(error.is_not_found());
    }
}
