//! Content-addressed blob storage
//!
//! A `ContentStore` maps a digest to immutable bytes. Writes are
//! byte-for-byte idempotent: storing content that is already present
//! returns the existing digest without rewriting, so concurrent puts of
//! the same bytes race harmlessly and converge. No update or delete is
//! exposed at this layer; removal is a higher-level reference-counted
//! garbage-collection concern.

use crate::digest::Digest;
use crate::error::{DepotError, Result};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Opaque content-addressed byte sink
///
/// Implementations must be safe to share across threads; all methods take
/// `&self` and synchronize internally.
pub trait ContentStore: Send + Sync {
    /// Store bytes, returning their digest. Idempotent.
    fn put(&self, data: &[u8]) -> Result<Digest>;

    /// Retrieve the bytes for a digest
    fn get(&self, digest: &Digest) -> Result<Vec<u8>>;

    /// Check whether content with this digest is present
    fn contains(&self, digest: &Digest) -> bool;

    /// Number of distinct blobs stored
    fn blob_count(&self) -> usize;
}

/// In-memory content store
///
/// The default backend; suitable for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<AHashMap<Digest, Arc<Vec<u8>>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryContentStore {
    fn put(&self, data: &[u8]) -> Result<Digest> {
        let digest = Digest::of(data);
        let mut blobs = self.blobs.write();
        if !blobs.contains_key(&digest) {
            debug!("Storing {} bytes under {:?}", data.len(), digest);
            blobs.insert(digest, Arc::new(data.to_vec()));
        }
        Ok(digest)
    }

    fn get(&self, digest: &Digest) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(digest)
            .map(|b| b.as_ref().clone())
            .ok_or(DepotError::ContentNotFound(*digest))
    }

    fn contains(&self, digest: &Digest) -> bool {
        self.blobs.read().contains_key(digest)
    }

    fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }
}

/// Sidecar metadata written next to each blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMeta {
    /// Blob size in bytes
    pub size: u64,

    /// When the blob was first stored
    pub stored_at: DateTime<Utc>,
}

/// Filesystem-backed content store
///
/// Blobs live at `<root>/blobs/<first-two-hex>/<digest-hex>` with a JSON
/// metadata sidecar. Writes go through a temporary file and rename so a
/// blob is either fully present or absent.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Open (or create) a store rooted at the given directory
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("blobs"))?;
        Ok(FsContentStore { root })
    }

    fn blob_path(&self, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        self.root.join("blobs").join(&hex[..2]).join(&hex)
    }

    /// Read the metadata sidecar for a stored blob
    pub fn meta(&self, digest: &Digest) -> Result<BlobMeta> {
        let path = self.blob_path(digest).with_extension("json");
        let json = std::fs::read_to_string(&path)
            .map_err(|_| DepotError::ContentNotFound(*digest))?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl ContentStore for FsContentStore {
    fn put(&self, data: &[u8]) -> Result<Digest> {
        let digest = Digest::of(data);
        let path = self.blob_path(&digest);

        // Already present: content-addressed writes are a no-op
        if path.exists() {
            return Ok(digest);
        }

        let parent = path.parent().ok_or_else(|| {
            DepotError::InvalidPath(format!("blob path has no parent: {}", path.display()))
        })?;
        std::fs::create_dir_all(parent)?;

        debug!("Writing {} bytes to {}", data.len(), path.display());

        // Write-then-rename through a per-writer temp file, so same-digest
        // racers never touch each other's partial writes. If the rename
        // still fails with the final blob in place, a racer won with
        // identical bytes.
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        std::fs::write(&tmp, data)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            if !path.exists() {
                return Err(e.into());
            }
            return Ok(digest);
        }

        let meta = BlobMeta {
            size: data.len() as u64,
            stored_at: Utc::now(),
        };
        std::fs::write(path.with_extension("json"), serde_json::to_string_pretty(&meta)?)?;

        Ok(digest)
    }

    fn get(&self, digest: &Digest) -> Result<Vec<u8>> {
        let path = self.blob_path(digest);
        std::fs::read(&path).map_err(|_| DepotError::ContentNotFound(*digest))
    }

    fn contains(&self, digest: &Digest) -> bool {
        self.blob_path(digest).exists()
    }

    fn blob_count(&self) -> usize {
        let blobs = self.root.join("blobs");
        let mut count = 0;
        if let Ok(shards) = std::fs::read_dir(&blobs) {
            for shard in shards.flatten() {
                if let Ok(entries) = std::fs::read_dir(shard.path()) {
                    count += entries
                        .flatten()
                        .filter(|e| e.path().extension().is_none())
                        .count();
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idempotent_put(store: &dyn ContentStore) {
        let d1 = store.put(b"same bytes").unwrap();
        let d2 = store.put(b"same bytes").unwrap();
        assert_eq!(d1, d2);
        assert_eq!(store.blob_count(), 1);
        assert_eq!(store.get(&d1).unwrap(), b"same bytes");
    }

    #[test]
    fn test_memory_put_is_idempotent() {
        idempotent_put(&MemoryContentStore::new());
    }

    #[test]
    fn test_fs_put_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        idempotent_put(&FsContentStore::new(dir.path()).unwrap());
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = MemoryContentStore::new();
        let missing = Digest::of(b"never stored");
        match store.get(&missing) {
            Err(DepotError::ContentNotFound(d)) => assert_eq!(d, missing),
            other => panic!("expected ContentNotFound, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_fs_meta_sidecar() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FsContentStore::new(dir.path()).unwrap();

        let digest = store.put(b"with metadata").unwrap();
        let meta = store.meta(&digest).unwrap();
        assert_eq!(meta.size, 13);
    }

    #[test]
    fn test_fs_distinct_blobs() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FsContentStore::new(dir.path()).unwrap();

        let d1 = store.put(b"one").unwrap();
        let d2 = store.put(b"two").unwrap();
        assert_ne!(d1, d2);
        assert_eq!(store.blob_count(), 2);
        assert!(store.contains(&d1));
        assert!(store.contains(&d2));
    }

    #[test]
    fn test_fs_concurrent_identical_puts_converge() {
        use std::sync::{Arc, Barrier};

        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(FsContentStore::new(dir.path()).unwrap());

        // Fresh bytes each round so every round races the write path,
        // not the already-present fast path.
        for round in 0..200 {
            let bytes = format!("contended round {}", round).into_bytes();
            let barrier = Arc::new(Barrier::new(4));

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    let bytes = bytes.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.put(&bytes).unwrap()
                    })
                })
                .collect();

            let digests: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert!(digests.windows(2).all(|w| w[0] == w[1]));
            assert_eq!(store.get(&digests[0]).unwrap(), bytes);
        }

        assert_eq!(store.blob_count(), 200);
    }

    #[test]
    fn test_concurrent_puts_of_same_bytes_converge() {
        use std::sync::Arc;

        let store = Arc::new(MemoryContentStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.put(b"racing bytes").unwrap())
            })
            .collect();

        let digests: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(digests.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.blob_count(), 1);
    }
}
