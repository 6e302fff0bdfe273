//! Relative-path resolution for uploaded packages
//!
//! A package's relative path is either supplied verbatim by the caller or
//! derived from structured placement attributes (distribution + component
//! + filename) as a pooled path:
//!
//! ```text
//! pool/<distribution>/<component>/<first-letter>/<name>/<filename>
//! ```
//!
//! Resolution is deterministic (identical inputs always yield the
//! identical path string), which is what makes the catalog's
//! (digest, relative_path) uniqueness check meaningful across repeated
//! uploads.

use crate::error::{DepotError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structured placement attributes for pooled paths
///
/// # Rules
/// - `distribution` and `component` must be non-empty, lowercase
///   alphanumerics plus hyphens/dots/underscores, no slashes
/// - `filename` must be a bare filename (no path separators)
///
/// The package name used for the pool hierarchy is the filename up to the
/// first `_` (Debian-style `name_version_arch` filenames) or the whole
/// filename when no underscore is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPlacement {
    pub distribution: String,
    pub component: String,
    pub filename: String,
}

impl PoolPlacement {
    /// Pattern for valid distribution/component tokens
    const TOKEN_PATTERN: &'static str = r"^[a-z0-9][a-z0-9._-]*$";

    pub fn new(
        distribution: impl Into<String>,
        component: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        PoolPlacement {
            distribution: distribution.into(),
            component: component.into(),
            filename: filename.into(),
        }
    }

    /// Validate all placement attributes
    pub fn validate(&self) -> Result<()> {
        let token = Regex::new(Self::TOKEN_PATTERN).unwrap();

        for (field, value) in [
            ("distribution", &self.distribution),
            ("component", &self.component),
        ] {
            if !token.is_match(value) {
                return Err(DepotError::InvalidPlacement(format!(
                    "{} '{}' must be lowercase alphanumeric with ._- separators",
                    field, value
                )));
            }
        }

        if self.filename.is_empty() || self.filename.contains('/') || self.filename.contains('\\')
        {
            return Err(DepotError::InvalidPlacement(format!(
                "filename '{}' must be a bare file name",
                self.filename
            )));
        }

        Ok(())
    }

    /// Package name portion of the filename (up to the first underscore)
    fn package_name(&self) -> &str {
        self.filename
            .split('_')
            .next()
            .unwrap_or(&self.filename)
    }

    /// Build the pooled path for these attributes
    fn pool_path(&self) -> Result<String> {
        self.validate()?;

        let name = self.package_name();
        let first = name.chars().next().ok_or_else(|| {
            DepotError::InvalidPlacement(format!(
                "filename '{}' has no package name portion",
                self.filename
            ))
        })?;

        Ok(format!(
            "pool/{}/{}/{}/{}/{}",
            self.distribution, self.component, first, name, self.filename
        ))
    }
}

/// Resolves the relative path a package is stored under
pub struct PathResolver;

impl PathResolver {
    /// Resolve a relative path from an explicit path or placement attributes
    ///
    /// An explicit path wins when both are given: structured placement only
    /// determines where content lands when the caller has not chosen a
    /// location. Fails with `InvalidPlacement` when neither input fully
    /// determines a path.
    pub fn resolve(
        explicit_path: Option<&str>,
        placement: Option<&PoolPlacement>,
    ) -> Result<String> {
        if let Some(path) = explicit_path {
            return Self::normalize(path);
        }

        if let Some(placement) = placement {
            return placement.pool_path();
        }

        Err(DepotError::InvalidPlacement(
            "either an explicit relative path or full placement attributes are required".into(),
        ))
    }

    /// Normalize an explicit relative path
    ///
    /// Backslashes become forward slashes; leading slashes and empty or
    /// `.`/`..` segments are rejected so a path cannot escape the pool.
    pub fn normalize(path: &str) -> Result<String> {
        let normalized = path.replace('\\', "/");

        if normalized.is_empty() {
            return Err(DepotError::InvalidPath("path is empty".into()));
        }
        if normalized.starts_with('/') {
            return Err(DepotError::InvalidPath(format!(
                "path must be relative: {}",
                path
            )));
        }
        for segment in normalized.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(DepotError::InvalidPath(format!(
                    "path contains invalid segment: {}",
                    path
                )));
            }
        }

        Ok(normalized)
    }
}
