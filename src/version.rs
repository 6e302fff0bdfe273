//! Repository versions and version chains
//!
//! Versions form a strictly ordered, append-only chain `V0 -> V1 -> ...`
//! per repository. Version 0 is the empty baseline created with the
//! repository itself. Each version is a frozen snapshot of package
//! membership plus the delta from its predecessor; once published, its
//! number and membership never change. The chain is an arena of immutable
//! `Arc` records indexed by number; the "latest" pointer is the only
//! thing that advances.

use crate::package::PackageId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Immutable, numbered snapshot of a repository's package membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryVersion {
    number: u64,
    membership: BTreeSet<PackageId>,
    added: BTreeSet<PackageId>,
    removed: BTreeSet<PackageId>,
    created_at: DateTime<Utc>,
}

impl RepositoryVersion {
    /// The empty baseline (version 0)
    pub(crate) fn baseline() -> Self {
        RepositoryVersion {
            number: 0,
            membership: BTreeSet::new(),
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Derive the successor of `base` with the given membership
    ///
    /// Returns `None` when the membership is identical to the base's:
    /// a no-op transition allocates no version number.
    pub(crate) fn derive(base: &RepositoryVersion, membership: BTreeSet<PackageId>) -> Option<Self> {
        if membership == base.membership {
            return None;
        }

        let added = membership.difference(&base.membership).copied().collect();
        let removed = base.membership.difference(&membership).copied().collect();

        Some(RepositoryVersion {
            number: base.number + 1,
            membership,
            added,
            removed,
            created_at: Utc::now(),
        })
    }

    /// Version number (dense, starting at 0)
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Full materialized membership set
    pub fn membership(&self) -> &BTreeSet<PackageId> {
        &self.membership
    }

    /// Packages added relative to the previous version
    pub fn added(&self) -> &BTreeSet<PackageId> {
        &self.added
    }

    /// Packages removed relative to the previous version
    pub fn removed(&self) -> &BTreeSet<PackageId> {
        &self.removed
    }

    pub fn contains(&self, id: PackageId) -> bool {
        self.membership.contains(&id)
    }

    pub fn package_count(&self) -> usize {
        self.membership.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Append-only chain of immutable versions for one repository
pub struct VersionChain {
    versions: RwLock<Vec<Arc<RepositoryVersion>>>,
}

impl VersionChain {
    /// Create a chain seeded with the empty baseline version
    pub(crate) fn new() -> Self {
        VersionChain {
            versions: RwLock::new(vec![Arc::new(RepositoryVersion::baseline())]),
        }
    }

    /// The most recent version. The chain is never empty.
    pub fn latest(&self) -> Arc<RepositoryVersion> {
        let versions = self.versions.read();
        versions[versions.len() - 1].clone()
    }

    /// Look up a version by number
    pub fn version(&self, number: u64) -> Option<Arc<RepositoryVersion>> {
        self.versions.read().get(number as usize).cloned()
    }

    /// Number of versions in the chain (latest number + 1)
    pub fn len(&self) -> u64 {
        self.versions.read().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Compare-and-append: publish `candidate` only if the chain's latest
    /// version is still `expected_base`
    ///
    /// On success the candidate becomes the latest version. On failure the
    /// current latest is returned so the caller can rebase and retry.
    pub(crate) fn publish(
        &self,
        candidate: RepositoryVersion,
        expected_base: u64,
    ) -> std::result::Result<Arc<RepositoryVersion>, Arc<RepositoryVersion>> {
        let mut versions = self.versions.write();
        let latest = &versions[versions.len() - 1];

        if latest.number() != expected_base {
            return Err(latest.clone());
        }

        debug_assert_eq!(candidate.number(), expected_base + 1);
        let published = Arc::new(candidate);
        versions.push(published.clone());
        Ok(published)
    }
}
