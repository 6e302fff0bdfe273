//! Package records
//!
//! A `Package` binds an artifact (or, for source packages, a descriptor
//! artifact plus companions) to a relative path. It is the deduplicated
//! unit of catalog identity: the pair (digest, relative_path) is globally
//! unique, and records are immutable after creation: there is no update
//! or delete lifecycle, only creation and repository-membership change.

use crate::digest::Digest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque package identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId(Uuid);

impl PackageId {
    pub(crate) fn generate() -> Self {
        PackageId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Package kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageType {
    /// A single binary artifact
    Binary,
    /// A descriptor artifact plus companion artifacts
    Source,
}

/// Immutable package record
///
/// Fields are private behind accessors; nothing in the public API can
/// modify a record once the catalog has created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    id: PackageId,
    digest: Digest,
    relative_path: String,
    package_type: PackageType,
    /// Companion digests for source packages, sorted for stable equality.
    /// Auxiliary only: not part of the uniqueness key.
    companions: Vec<Digest>,
    created_at: DateTime<Utc>,
}

impl Package {
    pub(crate) fn new(
        digest: Digest,
        relative_path: String,
        package_type: PackageType,
        mut companions: Vec<Digest>,
    ) -> Self {
        companions.sort();
        companions.dedup();
        Package {
            id: PackageId::generate(),
            digest,
            relative_path,
            package_type,
            companions,
            created_at: Utc::now(),
        }
    }

    /// Opaque identifier, stable for the lifetime of the depot
    pub fn id(&self) -> PackageId {
        self.id
    }

    /// Primary content digest (the descriptor's digest for source packages)
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Logical path the package is stored under
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    /// Companion artifact digests (empty for binary packages)
    pub fn companions(&self) -> &[Digest] {
        &self.companions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when this package references the given artifact digest,
    /// either as its primary content or as a companion
    pub fn references(&self, digest: &Digest) -> bool {
        self.digest == *digest || self.companions.binary_search(digest).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companions_sorted_and_deduped() {
        let a = Digest::of(b"a");
        let b = Digest::of(b"b");

        let pkg = Package::new(
            Digest::of(b"dsc"),
            "pkg_1.0.dsc".into(),
            PackageType::Source,
            vec![b, a, b],
        );

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(pkg.companions(), expected.as_slice());
    }

    #[test]
    fn test_references_primary_and_companions() {
        let dsc = Digest::of(b"dsc");
        let tarball = Digest::of(b"orig.tar.gz");
        let unrelated = Digest::of(b"unrelated");

        let pkg = Package::new(dsc, "pkg_1.0.dsc".into(), PackageType::Source, vec![tarball]);

        assert!(pkg.references(&dsc));
        assert!(pkg.references(&tarball));
        assert!(!pkg.references(&unrelated));
    }

    #[test]
    fn test_serialization_round_trip() {
        let pkg = Package::new(
            Digest::of(b"bytes"),
            "foo.deb".into(),
            PackageType::Binary,
            Vec::new(),
        );

        let json = serde_json::to_string(&pkg).unwrap();
        let back: Package = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pkg);
    }
}
