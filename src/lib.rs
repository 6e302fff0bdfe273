//! # Depot - Content-Addressable Artifact Depot
//!
//! `depot-rs` is a deduplication and versioning engine for binary
//! artifacts, as used by software-repository managers:
//!
//! - **Content-addressed storage**: artifacts are identified by SHA-256
//!   digest; storing the same bytes twice is a no-op
//! - **Deduplicated packages**: one catalog record per unique
//!   (digest, relative path) pair, immutable after creation
//! - **Immutable repository versions**: append-only, copy-on-write chains
//!   of membership snapshots, densely numbered from 0
//! - **Pooled paths**: deterministic `pool/<dist>/<component>/...` layout
//!   derived from structured placement attributes
//!
//! ## Quick Start
//!
//! ```rust
//! use depot_rs::{Depot, Result};
//!
//! # fn main() -> Result<()> {
//! let depot = Depot::new();
//!
//! // Store content and bind it to a logical path
//! let artifact = depot.store_artifact(b"deb payload")?;
//! let (package, created) = depot.create_package(artifact.digest, Some("foo.deb"), None)?;
//! assert!(created);
//!
//! // Track it in a versioned repository
//! depot.create_repository("bionic")?;
//! let version = depot.add_packages("bionic", &[package.id()])?;
//! assert_eq!(version.number(), 1);
//!
//! // Repeating the identical upload changes nothing
//! let (again, created) = depot.create_package(artifact.digest, Some("foo.deb"), None)?;
//! assert!(!created);
//! assert_eq!(again.id(), package.id());
//! # Ok(())
//! # }
//! ```
//!
//! ## Structured placement
//!
//! ```rust
//! use depot_rs::{Depot, PoolPlacement, Result};
//!
//! # fn main() -> Result<()> {
//! let depot = Depot::new();
//! let artifact = depot.store_artifact(b"pool payload")?;
//!
//! let placement = PoolPlacement::new("bionic", "main", "foo_1.0_amd64.deb");
//! let (package, _) = depot.create_package(artifact.digest, None, Some(&placement))?;
//! assert_eq!(package.relative_path(), "pool/bionic/main/f/foo/foo_1.0_amd64.deb");
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod catalog;
pub mod content;
pub mod digest;
pub mod error;
pub mod package;
pub mod placement;
pub mod repository;
pub mod version;

pub use artifact::{Artifact, ArtifactRegistry};
pub use catalog::{PackageCatalog, PackageQuery};
pub use content::{BlobMeta, ContentStore, FsContentStore, MemoryContentStore};
pub use digest::Digest;
pub use error::{DepotError, Result};
pub use package::{Package, PackageId, PackageType};
pub use placement::{PathResolver, PoolPlacement};
pub use repository::{Repository, RepositoryService, MAX_APPEND_RETRIES};
pub use version::{RepositoryVersion, VersionChain};

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a one-shot package upload
#[derive(Clone)]
pub struct UploadOutcome {
    /// The (possibly pre-existing) package record
    pub package: Arc<Package>,

    /// True when this upload created the package
    pub created: bool,

    /// The repository version observed after the upload, when a
    /// repository was targeted. Unchanged when the add was a no-op.
    pub version: Option<Arc<RepositoryVersion>>,
}

/// High-level depot API
///
/// Wires an `ArtifactRegistry`, the shared `PackageCatalog`, and the
/// `RepositoryService` over one content store, and exposes the narrow
/// operation set external collaborators consume.
///
/// All methods take `&self`; a `Depot` can be shared across threads
/// behind an `Arc`.
pub struct Depot {
    registry: ArtifactRegistry,
    catalog: Arc<PackageCatalog>,
    service: RepositoryService,
}

impl Depot {
    /// Create a depot over an in-memory content store
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryContentStore::new()))
    }

    /// Create a depot over any content store backend
    pub fn with_store(store: Arc<dyn ContentStore>) -> Self {
        let catalog = Arc::new(PackageCatalog::new());
        Depot {
            registry: ArtifactRegistry::new(store),
            service: RepositoryService::new(catalog.clone()),
            catalog,
        }
    }

    // --- artifacts ---

    /// Store raw bytes, registering (or re-observing) their artifact
    pub fn store_artifact(&self, data: &[u8]) -> Result<Arc<Artifact>> {
        self.registry.store_artifact(data)
    }

    /// Artifact metadata for a digest
    pub fn artifact(&self, digest: &Digest) -> Result<Arc<Artifact>> {
        self.registry.artifact(digest)
    }

    /// Raw bytes for a digest
    pub fn content(&self, digest: &Digest) -> Result<Vec<u8>> {
        self.registry.content(digest)
    }

    /// True when any package still references the digest. GC of
    /// unreferenced artifacts happens outside the depot core.
    pub fn is_referenced(&self, digest: &Digest) -> bool {
        self.catalog.is_referenced(digest)
    }

    // --- packages ---

    /// Create (or fetch) the binary package for a stored artifact
    ///
    /// The relative path comes from `explicit_path` verbatim or is derived
    /// from `placement`; the artifact must already be stored.
    pub fn create_package(
        &self,
        digest: Digest,
        explicit_path: Option<&str>,
        placement: Option<&PoolPlacement>,
    ) -> Result<(Arc<Package>, bool)> {
        if !self.registry.contains(&digest) {
            return Err(DepotError::ContentNotFound(digest));
        }
        let relative_path = PathResolver::resolve(explicit_path, placement)?;
        debug!("create_package {:?} at '{}'", digest, relative_path);

        Ok(self
            .catalog
            .get_or_create(digest, &relative_path, PackageType::Binary, Vec::new()))
    }

    /// Create (or fetch) a source package
    ///
    /// `descriptor` is the key-bearing digest (the `.dsc`-equivalent);
    /// `companions` are its constituent artifacts, which must all be
    /// stored already. Companions are auxiliary attributes, not part of
    /// the uniqueness key.
    pub fn create_source_package(
        &self,
        descriptor: Digest,
        companions: &[Digest],
        explicit_path: Option<&str>,
        placement: Option<&PoolPlacement>,
    ) -> Result<(Arc<Package>, bool)> {
        if !self.registry.contains(&descriptor) {
            return Err(DepotError::ContentNotFound(descriptor));
        }
        for companion in companions {
            if !self.registry.contains(companion) {
                return Err(DepotError::MissingCompanion(*companion));
            }
        }

        let relative_path = PathResolver::resolve(explicit_path, placement)?;
        Ok(self.catalog.get_or_create(
            descriptor,
            &relative_path,
            PackageType::Source,
            companions.to_vec(),
        ))
    }

    /// Read a package record by id
    pub fn read_package(&self, id: PackageId) -> Result<Arc<Package>> {
        self.catalog.read(id)
    }

    /// List packages matching a filter
    pub fn list_packages(&self, query: &PackageQuery) -> Vec<Arc<Package>> {
        self.catalog.list(query)
    }

    /// The shared package catalog
    pub fn catalog(&self) -> &PackageCatalog {
        &self.catalog
    }

    // --- repositories ---

    /// Create a named repository with an empty version 0
    pub fn create_repository(&self, name: &str) -> Result<Arc<Repository>> {
        self.service.create_repository(name)
    }

    /// Look up a repository by name
    pub fn repository(&self, name: &str) -> Result<Arc<Repository>> {
        self.service.repository(name)
    }

    /// Add packages to a repository; returns the resulting latest version
    pub fn add_packages(&self, name: &str, ids: &[PackageId]) -> Result<Arc<RepositoryVersion>> {
        self.service.add_packages(name, ids)
    }

    /// Remove packages from a repository
    pub fn remove_packages(&self, name: &str, ids: &[PackageId]) -> Result<Arc<RepositoryVersion>> {
        self.service.remove_packages(name, ids)
    }

    /// Replace a repository's whole membership
    pub fn set_packages(&self, name: &str, ids: &[PackageId]) -> Result<Arc<RepositoryVersion>> {
        self.service.set_packages(name, ids)
    }

    /// Latest version of a repository
    pub fn get_latest_version(&self, name: &str) -> Result<Arc<RepositoryVersion>> {
        self.service.get_latest_version(name)
    }

    /// Specific version of a repository
    pub fn get_version(&self, name: &str, number: u64) -> Result<Arc<RepositoryVersion>> {
        self.service.get_version(name, number)
    }

    // --- one-shot upload ---

    /// Store bytes, create the package, and optionally add it to a
    /// repository in one call
    ///
    /// The repository is resolved before anything is stored, so targeting
    /// an unknown repository leaves no state behind. Artifact and package
    /// creation are idempotent, and a repeated upload of identical content
    /// at the same path into the same repository changes nothing.
    pub fn upload_package(
        &self,
        data: &[u8],
        explicit_path: Option<&str>,
        placement: Option<&PoolPlacement>,
        repository: Option<&str>,
    ) -> Result<UploadOutcome> {
        if let Some(name) = repository {
            self.service.repository(name)?;
        }

        let artifact = self.registry.store_artifact(data)?;
        let (package, created) = self.create_package(artifact.digest, explicit_path, placement)?;

        let version = match repository {
            Some(name) => Some(self.service.add_packages(name, &[package.id()])?),
            None => None,
        };

        if created {
            info!(
                "Uploaded package {} at '{}'",
                package.id(),
                package.relative_path()
            );
        }

        Ok(UploadOutcome {
            package,
            created,
            version,
        })
    }
}

impl Default for Depot {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for customizing depot creation
///
/// # Examples
///
/// ```rust,no_run
/// use depot_rs::DepotBuilder;
///
/// # fn main() -> depot_rs::Result<()> {
/// let depot = DepotBuilder::new()
///     .at_path("/var/lib/depot")  // filesystem-backed blobs
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DepotBuilder {
    store: Option<Arc<dyn ContentStore>>,
    path: Option<std::path::PathBuf>,
}

impl DepotBuilder {
    pub fn new() -> Self {
        DepotBuilder {
            store: None,
            path: None,
        }
    }

    /// Use a custom content store backend
    pub fn store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Keep blobs on the filesystem under the given root
    pub fn at_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Build the depot (in-memory store when nothing was configured)
    pub fn build(self) -> Result<Depot> {
        let store: Arc<dyn ContentStore> = match (self.store, self.path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FsContentStore::new(path)?),
            (None, None) => Arc::new(MemoryContentStore::new()),
        };
        Ok(Depot::with_store(store))
    }
}

impl Default for DepotBuilder {
    fn default() -> Self {
        Self::new()
    }
}
