//! Error types for depot operations

use crate::digest::Digest;
use thiserror::Error;

/// Depot operation result type
pub type Result<T> = std::result::Result<T, DepotError>;

/// Depot operation errors
#[derive(Error, Debug)]
pub enum DepotError {
    /// Referenced content digest does not exist in the store
    #[error("Content not found for digest {0}")]
    ContentNotFound(Digest),

    /// Referenced package does not exist
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// Referenced repository does not exist
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    /// Referenced repository version does not exist
    #[error("Repository '{repository}' has no version {number}")]
    VersionNotFound { repository: String, number: u64 },

    /// Repository with this name already exists
    #[error("Repository already exists: {0}")]
    RepositoryExists(String),

    /// Neither an explicit path nor complete placement attributes were supplied,
    /// or a supplied component is malformed
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// Malformed or empty relative path
    #[error("Invalid relative path: {0}")]
    InvalidPath(String),

    /// Malformed digest rendering (bad hex or wrong length)
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    /// The entity class is immutable by design; update and delete are not provided
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A companion artifact referenced by a source package is not registered
    #[error("Missing companion artifact: {0}")]
    MissingCompanion(Digest),

    /// Concurrent version appends could not be reconciled within the retry limit.
    /// The operation left no partial state and may be retried.
    #[error("Version append aborted after {attempts} conflicting attempts on repository '{repository}'")]
    ConflictAborted { repository: String, attempts: u32 },

    /// Underlying durable-store I/O failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sidecar metadata (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_is_distinct_from_not_found() {
        let unsupported = DepotError::UnsupportedOperation("update".into());
        let not_found = DepotError::PackageNotFound("abc".into());

        assert!(unsupported.to_string().contains("Unsupported operation"));
        assert!(not_found.to_string().contains("not found"));
        assert!(!unsupported.to_string().contains("not found"));
    }

    #[test]
    fn test_conflict_aborted_display() {
        let err = DepotError::ConflictAborted {
            repository: "bionic".into(),
            attempts: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("bionic"));
        assert!(msg.contains('8'));
    }
}
