//! Physical storage for uploaded blobs (images and content archives).
//!
//! Blobs live under a single configured root directory, split into an
//! `images/` subtree (thumbnails, screenshots) and a `files/` subtree
//! (downloadable archives).  Stored filenames are generated
//! (`{unix_millis}-{random}.{ext}`) so concurrent uploads never collide,
//! and the relative path recorded in the catalog always uses forward
//! slashes regardless of the host's separator.
//!
//! Writes are streamed chunk-by-chunk with the size cap enforced
//! mid-stream, so memory usage stays flat for archives up to the
//! configured ceiling.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Category governing which validation rules apply to an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Thumbnail,
    Screenshot,
    ContentFile,
}

impl AssetClass {
    /// Subdirectory under the storage root for this class.
    pub fn subdir(self) -> &'static str {
        match self {
            AssetClass::Thumbnail | AssetClass::Screenshot => "images",
            AssetClass::ContentFile => "files",
        }
    }

    /// Allowed file extensions (lowercase, no dot).
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            AssetClass::Thumbnail | AssetClass::Screenshot => {
                &["jpg", "jpeg", "png", "gif", "webp"]
            }
            AssetClass::ContentFile => &["zip", "rar", "jar", "mcpack", "mcaddon", "mcworld"],
        }
    }

    fn label(self) -> &'static str {
        match self {
            AssetClass::Thumbnail => "thumbnail",
            AssetClass::Screenshot => "screenshot",
            AssetClass::ContentFile => "content file",
        }
    }
}

/// Errors from the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Extension not in the allow-list for the asset class.
    #[error("invalid {class} type '.{extension}'; allowed: {allowed}")]
    InvalidAssetType {
        class: &'static str,
        extension: String,
        allowed: String,
    },

    /// The file exceeded the configured maximum size.
    #[error("file exceeds maximum size of {limit_bytes} bytes")]
    SizeExceeded { limit_bytes: u64 },

    /// The storage path does not reference an existing blob.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The storage path attempted to escape the storage root.
    #[error("path escapes storage root: {0}")]
    Traversal(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Descriptor for a successfully stored blob.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Generated filename, e.g. `"1714761600123-857361920.zip"`.
    pub filename: String,
    /// Forward-slash relative path under the storage root,
    /// e.g. `"files/1714761600123-857361920.zip"`.
    pub storage_path: String,
}

/// Filesystem blob store rooted at a configured directory.
///
/// Constructed once at startup and shared through
/// [`crate::state::AppState`].
#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
    max_file_size: u64,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }

    /// Create the root and both class subdirectories if absent.
    pub async fn ensure_layout(&self) -> io::Result<()> {
        fs::create_dir_all(self.root.join("images")).await?;
        fs::create_dir_all(self.root.join("files")).await?;
        Ok(())
    }

    /// Begin storing a new blob of the given class.
    ///
    /// Validates the extension of `original_name` against the class
    /// allow-list (case-insensitive, extension only – no content sniffing)
    /// and opens the destination file.  The caller feeds chunks through
    /// [`BlobWriter::write_chunk`] and must call [`BlobWriter::discard`]
    /// on any failure so no partial file is left behind.
    pub async fn create(
        &self,
        class: AssetClass,
        original_name: &str,
    ) -> Result<BlobWriter, StorageError> {
        let extension = extension_of(original_name).ok_or_else(|| invalid_type(class, ""))?;
        if !class
            .allowed_extensions()
            .contains(&extension.to_ascii_lowercase().as_str())
        {
            return Err(invalid_type(class, &extension));
        }

        let subdir = class.subdir();
        fs::create_dir_all(self.root.join(subdir)).await?;

        let filename = format!(
            "{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            rand::random::<u32>(),
            extension.to_ascii_lowercase()
        );
        // Built by string join so the recorded path is forward-slash on
        // every platform.
        let storage_path = format!("{subdir}/{filename}");
        let absolute = self.root.join(subdir).join(&filename);
        let file = fs::File::create(&absolute).await?;

        Ok(BlobWriter {
            file,
            absolute,
            blob: StoredBlob {
                filename,
                storage_path,
            },
            written: 0,
            limit: self.max_file_size,
        })
    }

    /// Store a complete in-memory buffer.  Convenience wrapper over
    /// [`BlobStore::create`] for small payloads and tests; the upload
    /// endpoint streams instead.
    pub async fn store_bytes(
        &self,
        class: AssetClass,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredBlob, StorageError> {
        let mut writer = self.create(class, original_name).await?;
        if let Err(e) = writer.write_chunk(bytes).await {
            writer.discard().await;
            return Err(e);
        }
        writer.finish().await
    }

    /// Resolve a recorded storage path to an absolute filesystem path,
    /// rejecting anything that would escape the storage root and failing
    /// with [`StorageError::NotFound`] if the blob is missing from disk.
    pub async fn resolve(&self, storage_path: &str) -> Result<PathBuf, StorageError> {
        let absolute = self.safe_join(storage_path)?;
        match fs::metadata(&absolute).await {
            Ok(meta) if meta.is_file() => Ok(absolute),
            Ok(_) => Err(StorageError::NotFound(storage_path.to_owned())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_path.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a blob.  Returns `Ok(true)` if a file was deleted and
    /// `Ok(false)` if it was already absent – deletion sweeps tolerate
    /// missing blobs, they only log them.
    pub async fn remove(&self, storage_path: &str) -> Result<bool, StorageError> {
        let absolute = self.safe_join(storage_path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Absolute path of the public images subtree (served statically).
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    fn safe_join(&self, storage_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(storage_path);
        let escapes = relative.components().any(|c| {
            !matches!(c, Component::Normal(_) | Component::CurDir)
        });
        if escapes || relative.as_os_str().is_empty() {
            return Err(StorageError::Traversal(storage_path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

/// In-progress blob write with a running size check.
pub struct BlobWriter {
    file: fs::File,
    absolute: PathBuf,
    blob: StoredBlob,
    written: u64,
    limit: u64,
}

impl BlobWriter {
    /// Append a chunk, failing with [`StorageError::SizeExceeded`] once the
    /// running total passes the configured cap.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.written += chunk.len() as u64;
        if self.written > self.limit {
            return Err(StorageError::SizeExceeded {
                limit_bytes: self.limit,
            });
        }
        self.file.write_all(chunk).await?;
        Ok(())
    }

    /// Flush and return the descriptor for the completed blob.  A flush
    /// failure discards the partial file before surfacing the error.
    pub async fn finish(mut self) -> Result<StoredBlob, StorageError> {
        match self.file.flush().await {
            Ok(()) => Ok(self.blob),
            Err(e) => {
                self.discard().await;
                Err(e.into())
            }
        }
    }

    /// Drop the partially written file.  Best-effort; a leftover partial is
    /// logged, not fatal.
    pub async fn discard(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.absolute).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.absolute.display(), error = %e, "failed to remove partial upload");
            }
        }
    }

    /// Bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_owned())
        .filter(|e| !e.is_empty())
}

fn invalid_type(class: AssetClass, extension: &str) -> StorageError {
    StorageError::InvalidAssetType {
        class: class.label(),
        extension: extension.to_owned(),
        allowed: class
            .allowed_extensions()
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    fn store_with_limit(dir: &tempfile::TempDir, limit: u64) -> BlobStore {
        BlobStore::new(dir.path(), limit)
    }

    #[tokio::test]
    async fn stores_under_class_subdir_with_forward_slash_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limit(&dir, 1024);

        let blob = store
            .store_bytes(AssetClass::ContentFile, "Epic Sword.zip", b"pk\x03\x04")
            .await
            .unwrap();

        assert!(blob.storage_path.starts_with("files/"));
        assert!(blob.storage_path.ends_with(".zip"));
        assert!(!blob.storage_path.contains('\\'));
        assert!(dir.path().join(&blob.storage_path).is_file());
    }

    #[tokio::test]
    async fn thumbnail_goes_to_images_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limit(&dir, 1024);

        let blob = store
            .store_bytes(AssetClass::Thumbnail, "cover.PNG", b"\x89PNG")
            .await
            .unwrap();
        assert!(blob.storage_path.starts_with("images/"));
        assert!(blob.storage_path.ends_with(".png"));
    }

    #[tokio::test]
    async fn rejects_disallowed_extension_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limit(&dir, 1024);

        let err = store
            .store_bytes(AssetClass::ContentFile, "virus.exe", b"MZ")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidAssetType { .. }));

        // Nothing may land on disk for a rejected upload.
        let entries = std::fs::read_dir(dir.path())
            .map(|d| d.count())
            .unwrap_or(0);
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn rejects_missing_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limit(&dir, 1024);

        let err = store
            .store_bytes(AssetClass::Screenshot, "screenshot", b"data")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidAssetType { .. }));
    }

    #[tokio::test]
    async fn size_cap_fires_mid_stream_and_discard_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limit(&dir, 8);

        let mut writer = store
            .create(AssetClass::ContentFile, "big.zip")
            .await
            .unwrap();
        writer.write_chunk(&[0u8; 6]).await.unwrap();
        let err = writer.write_chunk(&[0u8; 6]).await.unwrap_err();
        assert!(matches!(err, StorageError::SizeExceeded { limit_bytes: 8 }));
        writer.discard().await;

        let files: Vec<_> = std::fs::read_dir(dir.path().join("files"))
            .unwrap()
            .collect();
        assert!(files.is_empty(), "partial upload must be removed");
    }

    #[tokio::test]
    async fn resolve_finds_stored_blob_and_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limit(&dir, 1024);

        let blob = store
            .store_bytes(AssetClass::ContentFile, "pack.mcpack", b"data")
            .await
            .unwrap();
        let absolute = store.resolve(&blob.storage_path).await.unwrap();
        assert!(absolute.is_file());

        let err = store.resolve("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::Traversal(_)));
        let err = store.resolve("/etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::Traversal(_)));

        let err = store.resolve("files/absent.zip").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limit(&dir, 1024);

        let blob = store
            .store_bytes(AssetClass::ContentFile, "pack.zip", b"data")
            .await
            .unwrap();
        assert!(store.remove(&blob.storage_path).await.unwrap());
        // Second removal reports the blob as already absent, not an error.
        assert!(!store.remove(&blob.storage_path).await.unwrap());
    }

    #[tokio::test]
    async fn generated_filenames_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limit(&dir, 1024);

        let a = store
            .store_bytes(AssetClass::ContentFile, "same.zip", b"a")
            .await
            .unwrap();
        let b = store
            .store_bytes(AssetClass::ContentFile, "same.zip", b"b")
            .await
            .unwrap();
        assert_ne!(a.storage_path, b.storage_path);
    }
}
