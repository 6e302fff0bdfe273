//! Repositories and the versioning service
//!
//! A repository is a named collection whose membership is tracked across
//! an append-only chain of immutable versions. The service orchestrates
//! membership changes: every transition validates its inputs against the
//! shared catalog before anything becomes visible, then publishes the new
//! version through a compare-and-append on the repository's chain.
//!
//! Concurrent transitions on the same repository are reconciled
//! optimistically: a writer that loses the publish race rebases on the
//! observed latest version and retries, up to `MAX_APPEND_RETRIES`
//! attempts before surfacing `ConflictAborted`. Different repositories
//! never contend with each other.

use crate::catalog::PackageCatalog;
use crate::error::{DepotError, Result};
use crate::package::PackageId;
use crate::version::{RepositoryVersion, VersionChain};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Publish attempts before a transition gives up with `ConflictAborted`.
///
/// In-process chains rebase in one or two attempts; the bound matters for
/// durable backends where the publish step can keep losing the race.
pub const MAX_APPEND_RETRIES: u32 = 8;

/// A named collection with a version chain
pub struct Repository {
    name: String,
    chain: VersionChain,
    created_at: DateTime<Utc>,
}

impl Repository {
    fn new(name: String) -> Self {
        Repository {
            name,
            chain: VersionChain::new(),
            created_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Latest version (version 0 immediately after creation)
    pub fn latest(&self) -> Arc<RepositoryVersion> {
        self.chain.latest()
    }

    /// Look up a specific version by number
    pub fn version(&self, number: u64) -> Result<Arc<RepositoryVersion>> {
        self.chain
            .version(number)
            .ok_or_else(|| DepotError::VersionNotFound {
                repository: self.name.clone(),
                number,
            })
    }

    /// Number of versions in the chain
    pub fn version_count(&self) -> u64 {
        self.chain.len()
    }

    /// Apply a membership transition, publishing a new version
    ///
    /// The closure maps the base membership to the desired membership.
    /// When the result is identical to the base the transition is a no-op:
    /// no version number is allocated and the unchanged latest version is
    /// returned.
    fn transition<F>(&self, f: F) -> Result<Arc<RepositoryVersion>>
    where
        F: Fn(&BTreeSet<PackageId>) -> BTreeSet<PackageId>,
    {
        for attempt in 0..MAX_APPEND_RETRIES {
            let base = self.chain.latest();
            let membership = f(base.membership());

            let candidate = match RepositoryVersion::derive(&base, membership) {
                Some(candidate) => candidate,
                None => {
                    debug!(
                        "Repository '{}': membership unchanged, staying at version {}",
                        self.name,
                        base.number()
                    );
                    return Ok(base);
                }
            };

            match self.chain.publish(candidate, base.number()) {
                Ok(published) => {
                    info!(
                        "Repository '{}': published version {} ({} packages, +{} -{})",
                        self.name,
                        published.number(),
                        published.package_count(),
                        published.added().len(),
                        published.removed().len()
                    );
                    return Ok(published);
                }
                Err(observed) => {
                    debug!(
                        "Repository '{}': publish attempt {} lost to version {}, rebasing",
                        self.name,
                        attempt + 1,
                        observed.number()
                    );
                }
            }
        }

        Err(DepotError::ConflictAborted {
            repository: self.name.clone(),
            attempts: MAX_APPEND_RETRIES,
        })
    }
}

/// Creates repositories and applies membership transitions
///
/// Shares one `PackageCatalog` across all repositories; package ids are
/// validated against it before any version becomes visible, so a failed
/// transition leaves the chain exactly as it was.
pub struct RepositoryService {
    catalog: Arc<PackageCatalog>,
    repositories: DashMap<String, Arc<Repository>>,
}

impl RepositoryService {
    pub fn new(catalog: Arc<PackageCatalog>) -> Self {
        RepositoryService {
            catalog,
            repositories: DashMap::new(),
        }
    }

    /// Create a repository with an empty version 0
    pub fn create_repository(&self, name: &str) -> Result<Arc<Repository>> {
        if name.is_empty() {
            return Err(DepotError::InvalidPath("repository name is empty".into()));
        }

        let mut created = false;
        let repository = self
            .repositories
            .entry(name.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Repository::new(name.to_string()))
            })
            .clone();

        if !created {
            return Err(DepotError::RepositoryExists(name.to_string()));
        }

        info!("Created repository '{}' at version 0", name);
        Ok(repository)
    }

    /// Look up a repository by name
    pub fn repository(&self, name: &str) -> Result<Arc<Repository>> {
        self.repositories
            .get(name)
            .map(|r| r.clone())
            .ok_or_else(|| DepotError::RepositoryNotFound(name.to_string()))
    }

    /// Repository names, sorted
    pub fn list_repositories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repositories.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Add packages to a repository, producing a new version
    ///
    /// Adding only already-present packages is a no-op: the unchanged
    /// latest version is returned and no number is allocated.
    pub fn add_packages(
        &self,
        name: &str,
        package_ids: &[PackageId],
    ) -> Result<Arc<RepositoryVersion>> {
        let repository = self.repository(name)?;
        self.check_known(package_ids)?;

        repository.transition(|base| {
            let mut membership = base.clone();
            membership.extend(package_ids.iter().copied());
            membership
        })
    }

    /// Remove packages from a repository, producing a new version
    ///
    /// Removing packages that are not members is a no-op. The package
    /// records themselves are never deleted; only membership changes.
    pub fn remove_packages(
        &self,
        name: &str,
        package_ids: &[PackageId],
    ) -> Result<Arc<RepositoryVersion>> {
        let repository = self.repository(name)?;
        self.check_known(package_ids)?;

        repository.transition(|base| {
            let mut membership = base.clone();
            for id in package_ids {
                membership.remove(id);
            }
            membership
        })
    }

    /// Replace a repository's entire membership in one transition
    pub fn set_packages(
        &self,
        name: &str,
        package_ids: &[PackageId],
    ) -> Result<Arc<RepositoryVersion>> {
        let repository = self.repository(name)?;
        self.check_known(package_ids)?;

        repository.transition(|_| package_ids.iter().copied().collect())
    }

    /// Latest version of a repository
    pub fn get_latest_version(&self, name: &str) -> Result<Arc<RepositoryVersion>> {
        Ok(self.repository(name)?.latest())
    }

    /// Specific version of a repository
    pub fn get_version(&self, name: &str, number: u64) -> Result<Arc<RepositoryVersion>> {
        self.repository(name)?.version(number)
    }

    /// All referenced ids must exist in the catalog before any mutation
    fn check_known(&self, package_ids: &[PackageId]) -> Result<()> {
        for id in package_ids {
            self.catalog.read(*id)?;
        }
        Ok(())
    }
}
