//! Append-only on-disk store for uploaded documents.

use crate::schema::UploadedDocument;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Shape of every name [`DocumentStore::store`] can generate.
static STORED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[A-Za-z0-9]{1,16})?$").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No file uploaded")]
    Empty,
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("failed to write document: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to read document: {0}")]
    Read(#[source] std::io::Error),
}

/// Disk-backed document store.
///
/// Names are millisecond timestamps plus the original extension. The last
/// issued timestamp is kept so two uploads in the same millisecond still get
/// distinct names, and files are opened with `create_new` so nothing is ever
/// overwritten.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    url_prefix: String,
    last_stamp: Arc<Mutex<u64>>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            last_stamp: Arc::new(Mutex::new(0)),
        }
    }

    /// Create the storage directory if needed.
    pub async fn init(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `bytes` under a fresh name.
    pub async fn store(
        &self,
        bytes: &[u8],
        original_name: &str,
    ) -> Result<UploadedDocument, StoreError> {
        if bytes.is_empty() {
            return Err(StoreError::Empty);
        }

        let extension = extension_of(original_name);

        loop {
            let stored_name = format!("{}{}", self.next_stamp(), extension);
            let storage_path = self.root.join(&stored_name);

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&storage_path)
                .await;

            let file = match file {
                Ok(file) => file,
                // A file from an earlier process run can hold this stamp.
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StoreError::Write(e)),
            };

            write_or_discard(file, &storage_path, bytes)
                .await
                .map_err(StoreError::Write)?;

            tracing::debug!(
                "DocumentStore: stored '{}' as '{}' ({} bytes)",
                original_name,
                stored_name,
                bytes.len()
            );

            return Ok(UploadedDocument {
                url: format!("{}/{}", self.url_prefix, stored_name),
                stored_name,
                original_name: original_name.to_string(),
                storage_path,
            });
        }
    }

    /// Read back the bytes of a stored document.
    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(stored_name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(stored_name.to_string()))
            }
            Err(e) => Err(StoreError::Read(e)),
        }
    }

    /// Map a stored name to its path on disk.
    ///
    /// Only names of the generated shape resolve; anything else, including
    /// path separators and `..`, is reported as not found.
    pub fn resolve(&self, stored_name: &str) -> Result<PathBuf, StoreError> {
        if !STORED_NAME.is_match(stored_name) {
            return Err(StoreError::NotFound(stored_name.to_string()));
        }
        Ok(self.root.join(stored_name))
    }

    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let mut last = self.last_stamp.lock().unwrap_or_else(|e| e.into_inner());
        *last = now.max(*last + 1);
        *last
    }
}

/// Write `bytes` through `writer`, removing `path` if the write fails so a
/// partial file is never left under a servable name.
async fn write_or_discard<W>(mut writer: W, path: &Path, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;
    drop(writer);

    if written.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(
                "DocumentStore: could not remove partial '{}': {}",
                path.display(),
                e
            );
        }
    }
    written
}

/// Extension of the client-side name including the dot, or empty when the
/// name has none we are willing to keep.
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

/// Content type to serve a stored document with.
pub fn content_type_for(stored_name: &str) -> &'static str {
    match Path::new(stored_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn temp_store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), "/uploads");
        (dir, store)
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let (_dir, store) = temp_store();
        let bytes = b"%PDF-1.4 fake body \x00\xff".to_vec();

        let doc = store.store(&bytes, "report.pdf").await.unwrap();
        assert!(doc.stored_name.ends_with(".pdf"));
        assert_eq!(doc.url, format!("/uploads/{}", doc.stored_name));
        assert_eq!(doc.original_name, "report.pdf");
        assert_eq!(doc.storage_path, store.resolve(&doc.stored_name).unwrap());
        assert_eq!(std::fs::read(&doc.storage_path).unwrap(), bytes);

        let read = store.read(&doc.stored_name).await.unwrap();
        assert_eq!(read, bytes);
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let (_dir, store) = temp_store();
        let mut names = HashSet::new();
        for _ in 0..25 {
            let doc = store.store(b"x", "a.pdf").await.unwrap();
            assert!(names.insert(doc.stored_name));
        }
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.store(&[], "a.pdf").await,
            Err(StoreError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_traversal_names_not_found() {
        let (_dir, store) = temp_store();
        for name in ["123.pdf", "../secret", "a/b.pdf", "..", ""] {
            assert!(
                matches!(store.read(name).await, Err(StoreError::NotFound(_))),
                "{name}"
            );
        }
    }

    #[tokio::test]
    async fn test_odd_extensions_dropped() {
        let (_dir, store) = temp_store();
        let doc = store.store(b"x", "notes").await.unwrap();
        assert!(doc.stored_name.chars().all(|c| c.is_ascii_digit()));

        let doc = store.store(b"x", "weird.p d f").await.unwrap();
        assert!(!doc.stored_name.contains(' '));
        assert!(store.read(&doc.stored_name).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_failure_is_not_reported_as_write() {
        let (dir, store) = temp_store();
        std::fs::create_dir(dir.path().join("1718000000000.pdf")).unwrap();

        let err = store.read("1718000000000.pdf").await.unwrap_err();
        assert!(matches!(err, StoreError::Read(_)), "{err:?}");
        assert!(err.to_string().starts_with("failed to read document"));
    }

    struct BrokenDisk;

    impl AsyncWrite for BrokenDisk {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::other("disk full")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let (dir, store) = temp_store();
        let path = dir.path().join("1718000000000.pdf");
        std::fs::write(&path, b"%PD").unwrap();

        let err = write_or_discard(BrokenDisk, &path, b"%PDF-1.4").await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());
        assert!(matches!(
            store.read("1718000000000.pdf").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for("1.pdf"), "application/pdf");
        assert_eq!(content_type_for("1.PDF"), "application/pdf");
        assert_eq!(content_type_for("1"), "application/octet-stream");
    }
}
