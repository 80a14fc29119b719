//! Version control error types

use thiserror::Error;

use crate::snapshot::SnapshotId;

/// Errors that can occur in version control operations
#[derive(Debug, Error)]
pub enum VersionError {
    /// Snapshot not found
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    /// Branch not found
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// Branch name already taken
    #[error("Branch already exists: {0}")]
    BranchExists(String),

    /// Restored payload does not match the stored checksum
    #[error("Checksum mismatch for snapshot {id}: expected {expected}, got {actual}")]
    Integrity {
        id: SnapshotId,
        expected: String,
        actual: String,
    },

    /// Snapshot is a branch head and cannot be deleted
    #[error("Snapshot {id} is the head of branch '{branch}'")]
    HeadProtected { id: SnapshotId, branch: String },

    /// Snapshot carries a tag that exempts it from deletion
    #[error("Snapshot {id} carries protected tag '{tag}'")]
    TagProtected { id: SnapshotId, tag: String },

    /// Payload transform failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
