//! Domain error types
//!
//! Validation failures for identifiers, names and snapshots.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Entry name is empty, `.`/`..`, or contains a separator
    #[error("Invalid entry name: {0}")]
    InvalidName(String),

    /// Persisted snapshot uses a format this build cannot read
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedSnapshotVersion(u32),
}
