use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ephemera_types::ObjectId;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::backend::{Backend, BackingEntry, BackingReader};
use crate::error::{StoreError, StoreResult};

/// Name of the staging subdirectory. Lives inside the root so the final
/// rename never crosses a filesystem boundary.
pub const STAGING_DIR: &str = ".staging";

/// Directory-backed [`Backend`].
///
/// Layout:
/// ```text
/// <root>/
///   .staging/        in-progress writes (tempfile names)
///   <object-id>      committed objects, one file each
/// ```
///
/// Writes go to `.staging/` first, are flushed, and are then linked into
/// place without clobbering.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
    staging: PathBuf,
}

impl FsBackend {
    /// Open (or create) a backend rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let staging = root.join(STAGING_DIR);
        std::fs::create_dir_all(&staging)?;
        debug!(root = %root.display(), "fs backend ready");
        Ok(Self { root, staging })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

#[async_trait]
impl Backend for FsBackend {
    async fn write_new(&self, id: &ObjectId, payload: Bytes) -> StoreResult<()> {
        let staging = self.staging.clone();
        let dest = self.object_path(id);

        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let mut tmp = NamedTempFile::new_in(&staging)?;
            tmp.write_all(&payload)?;
            tmp.as_file().sync_all()?;
            // A failed persist drops the temp file, which unlinks it.
            tmp.persist_noclobber(&dest).map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    StoreError::IdCollision
                } else {
                    StoreError::Backing(e.error)
                }
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Backing(io::Error::other(e)))?
    }

    async fn open(&self, id: &ObjectId) -> StoreResult<Option<BackingReader>> {
        let file = match tokio::fs::File::open(self.object_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        Ok(Some(BackingReader {
            reader: Box::pin(file),
            len,
        }))
    }

    async fn remove(&self, id: &ObjectId) -> StoreResult<bool> {
        match tokio::fs::remove_file(self.object_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StoreResult<Vec<BackingEntry>> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Removed between readdir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 entry");
                continue;
            };
            entries.push(BackingEntry {
                name,
                len: meta.len(),
                modified: DateTime::<Utc>::from(meta.modified()?),
            });
        }
        Ok(entries)
    }

    async fn clear_staging(&self) -> StoreResult<usize> {
        let mut dir = tokio::fs::read_dir(&self.staging).await?;
        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "failed to clear staging entry");
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ephemera_types::IdSpec;
    use tokio::io::AsyncReadExt;

    fn temp_backend() -> (tempfile::TempDir, FsBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();
        (dir, backend)
    }

    async fn read_all(backend: &FsBackend, id: &ObjectId) -> Vec<u8> {
        let mut reader = backend.open(id).await.unwrap().expect("should exist");
        let mut buf = Vec::new();
        reader.reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn write_then_open() {
        let (_dir, backend) = temp_backend();
        let id = IdSpec::default().generate();
        backend
            .write_new(&id, Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();

        let opened = backend.open(&id).await.unwrap().unwrap();
        assert_eq!(opened.len, 8);
        assert_eq!(read_all(&backend, &id).await, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn write_new_never_overwrites() {
        let (_dir, backend) = temp_backend();
        let id = IdSpec::default().generate();
        backend.write_new(&id, Bytes::from_static(b"first")).await.unwrap();

        let err = backend
            .write_new(&id, Bytes::from_static(b"second"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IdCollision));
        assert_eq!(read_all(&backend, &id).await, b"first");
    }

    #[tokio::test]
    async fn staging_is_empty_after_writes() {
        let (dir, backend) = temp_backend();
        let spec = IdSpec::default();
        for _ in 0..3 {
            backend
                .write_new(&spec.generate(), Bytes::from_static(b"x"))
                .await
                .unwrap();
        }
        let leftovers = std::fs::read_dir(dir.path().join(STAGING_DIR)).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn open_missing_is_none() {
        let (_dir, backend) = temp_backend();
        let id = IdSpec::default().generate();
        assert!(backend.open(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (_dir, backend) = temp_backend();
        let id = IdSpec::default().generate();
        backend.write_new(&id, Bytes::from_static(b"x")).await.unwrap();

        assert!(backend.remove(&id).await.unwrap());
        assert!(!backend.remove(&id).await.unwrap());
        assert!(backend.open(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_skips_staging_dir() {
        let (_dir, backend) = temp_backend();
        let id = IdSpec::default().generate();
        backend.write_new(&id, Bytes::from_static(b"abc")).await.unwrap();

        let entries = backend.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, id.as_str());
        assert_eq!(entries[0].len, 3);
    }

    #[tokio::test]
    async fn clear_staging_removes_leftovers() {
        let (dir, backend) = temp_backend();
        std::fs::write(dir.path().join(STAGING_DIR).join(".tmpA"), b"partial").unwrap();
        std::fs::write(dir.path().join(STAGING_DIR).join(".tmpB"), b"partial").unwrap();

        assert_eq!(backend.clear_staging().await.unwrap(), 2);
        assert_eq!(backend.clear_staging().await.unwrap(), 0);
    }
}
