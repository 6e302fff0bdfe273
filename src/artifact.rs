//! Artifact registry
//!
//! Wraps a `ContentStore` with per-digest metadata records. Exactly one
//! `Artifact` exists per unique digest regardless of how many times the
//! same bytes are uploaded.

use crate::content::ContentStore;
use crate::digest::Digest;
use crate::error::{DepotError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Metadata for one stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Content digest (the artifact's identity)
    pub digest: Digest,

    /// Size in bytes
    pub size: u64,

    /// When the content was first uploaded
    pub uploaded_at: DateTime<Utc>,
}

/// Registry of artifacts over a content store
pub struct ArtifactRegistry {
    store: Arc<dyn ContentStore>,
    records: DashMap<Digest, Arc<Artifact>>,
}

impl ArtifactRegistry {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        ArtifactRegistry {
            store,
            records: DashMap::new(),
        }
    }

    /// Store bytes and register the artifact. Idempotent: re-uploading
    /// known content returns the existing record.
    pub fn store_artifact(&self, data: &[u8]) -> Result<Arc<Artifact>> {
        let digest = self.store.put(data)?;

        // entry() resolves the insert race so one record survives
        let record = self
            .records
            .entry(digest)
            .or_insert_with(|| {
                debug!("Registering artifact {:?} ({} bytes)", digest, data.len());
                Arc::new(Artifact {
                    digest,
                    size: data.len() as u64,
                    uploaded_at: Utc::now(),
                })
            })
            .clone();

        Ok(record)
    }

    /// Look up an artifact record by digest
    pub fn artifact(&self, digest: &Digest) -> Result<Arc<Artifact>> {
        self.records
            .get(digest)
            .map(|r| r.clone())
            .ok_or(DepotError::ContentNotFound(*digest))
    }

    /// Fetch the raw bytes for a digest
    pub fn content(&self, digest: &Digest) -> Result<Vec<u8>> {
        self.store.get(digest)
    }

    /// True when a digest has a registered artifact
    pub fn contains(&self, digest: &Digest) -> bool {
        self.records.contains_key(digest)
    }

    /// Number of distinct artifacts registered
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
