//! Package catalog
//!
//! The catalog enforces global uniqueness over (digest, relative_path).
//! `get_or_create` is an atomic insert-or-fetch, not read-then-write,
//! so a race between two callers creating the "same" package resolves to
//! exactly one surviving record that both callers observe.
//!
//! Catalog entries are immutable and undeletable by design. The explicit
//! `update_package`/`delete_package` methods exist only to surface that
//! contract as `UnsupportedOperation`, distinct from `NotFound`:
//! repository membership is what changes over time, never the entries
//! themselves.

use crate::digest::Digest;
use crate::error::{DepotError, Result};
use crate::package::{Package, PackageId, PackageType};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Filter for package listings
#[derive(Debug, Clone, Default)]
pub struct PackageQuery {
    /// Exact relative-path match
    pub relative_path: Option<String>,
    /// Restrict to one package kind
    pub package_type: Option<PackageType>,
}

impl PackageQuery {
    pub fn by_path(path: impl Into<String>) -> Self {
        PackageQuery {
            relative_path: Some(path.into()),
            package_type: None,
        }
    }

    fn matches(&self, package: &Package) -> bool {
        if let Some(path) = &self.relative_path {
            if package.relative_path() != path {
                return false;
            }
        }
        if let Some(kind) = self.package_type {
            if package.package_type() != kind {
                return false;
            }
        }
        true
    }
}

/// Deduplicated package catalog shared by all repositories
#[derive(Default)]
pub struct PackageCatalog {
    /// Uniqueness constraint: one record per (digest, relative_path)
    by_key: DashMap<(Digest, String), Arc<Package>>,
    by_id: DashMap<PackageId, Arc<Package>>,
}

impl PackageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the package for (digest, relative_path), creating it if absent
    ///
    /// Returns the record plus a flag that is true only for the caller
    /// whose insert actually created it. Repeated calls with an identical
    /// key return the same package identity; the companion set of an
    /// existing record is not revisited (companions are auxiliary, not
    /// key-bearing).
    pub fn get_or_create(
        &self,
        digest: Digest,
        relative_path: &str,
        package_type: PackageType,
        companions: Vec<Digest>,
    ) -> (Arc<Package>, bool) {
        let mut created = false;
        let package = self
            .by_key
            .entry((digest, relative_path.to_string()))
            .or_insert_with(|| {
                created = true;
                let package = Arc::new(Package::new(
                    digest,
                    relative_path.to_string(),
                    package_type,
                    companions,
                ));
                // Both indexes must be populated before the entry guard
                // drops; a racer that observes the record through by_key
                // must already be able to read it by id.
                self.by_id.insert(package.id(), package.clone());
                debug!(
                    "Created package {} at '{}' ({:?})",
                    package.id(),
                    relative_path,
                    digest
                );
                package
            })
            .clone();

        (package, created)
    }

    /// Read a package record by id
    pub fn read(&self, id: PackageId) -> Result<Arc<Package>> {
        self.by_id
            .get(&id)
            .map(|p| p.clone())
            .ok_or_else(|| DepotError::PackageNotFound(id.to_string()))
    }

    /// Look up a package by its uniqueness key
    pub fn find(&self, digest: &Digest, relative_path: &str) -> Option<Arc<Package>> {
        self.by_key
            .get(&(*digest, relative_path.to_string()))
            .map(|p| p.clone())
    }

    /// List packages matching a query, ordered by (relative_path, digest)
    pub fn list(&self, query: &PackageQuery) -> Vec<Arc<Package>> {
        let mut packages: Vec<Arc<Package>> = self
            .by_id
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        packages.sort_by(|a, b| {
            a.relative_path()
                .cmp(b.relative_path())
                .then_with(|| a.digest().cmp(&b.digest()))
        });
        packages
    }

    /// Packages are immutable: always fails with `UnsupportedOperation`
    pub fn update_package(&self, id: PackageId) -> Result<()> {
        let _ = id;
        Err(DepotError::UnsupportedOperation(
            "packages are immutable; update is not provided".into(),
        ))
    }

    /// Packages are undeletable: always fails with `UnsupportedOperation`
    ///
    /// Removing a package from circulation is a repository-membership
    /// change, made through a new repository version.
    pub fn delete_package(&self, id: PackageId) -> Result<()> {
        let _ = id;
        Err(DepotError::UnsupportedOperation(
            "packages are immutable; delete is not provided".into(),
        ))
    }

    /// True when any catalog entry references the digest (primary or
    /// companion). Preserved for the out-of-scope garbage-collection
    /// contract on artifacts.
    pub fn is_referenced(&self, digest: &Digest) -> bool {
        self.by_id.iter().any(|entry| entry.value().references(digest))
    }

    /// Number of catalog entries
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
