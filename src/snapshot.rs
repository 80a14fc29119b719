//! Snapshot data structures

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot record format version
pub const RECORD_VERSION: u32 = 1;

/// Unique snapshot identifier
///
/// UUIDv7: a millisecond timestamp prefix plus a random suffix, so ids sort
/// roughly by creation time and never collide across manager instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage that produced the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Geometry,
    Mesh,
    Material,
    Computation,
    Results,
    Manual,
}

/// Kind of change a snapshot records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    Transform,
    Merge,
}

/// Payload as kept in the content table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "lowercase")]
pub enum StoredPayload {
    /// Uncompressed value
    Plain { value: serde_json::Value },
    /// Deflate-compressed canonical JSON bytes
    Deflate { bytes: Vec<u8> },
}

impl StoredPayload {
    /// True when the payload is stored compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, StoredPayload::Deflate { .. })
    }
}

/// Snapshot metadata
///
/// `tags` is the only field of a snapshot that may change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Record format version
    pub version: u32,
    /// Who created the snapshot
    pub author: String,
    /// Free-text description
    pub description: String,
    /// Mutable tag set
    pub tags: BTreeSet<String>,
    /// Canonical payload size in bytes
    pub size_bytes: u64,
    /// Pipeline stage that produced the payload
    pub operation: OperationKind,
    /// Kind of change recorded
    pub change: ChangeKind,
}

/// Position of a snapshot in the commit graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationships {
    /// Head of the owning branch when the snapshot was committed
    pub parent: Option<SnapshotId>,
    /// Snapshots committed on top of this one
    pub children: Vec<SnapshotId>,
    /// Branch the snapshot was committed on
    pub branch: String,
    /// Commit message
    pub message: String,
}

/// Findings of the structural checks run once at creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// False when any error was recorded
    pub is_valid: bool,
    /// Structural problems; recorded, never raised
    pub errors: Vec<String>,
    /// Non-fatal observations
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A report with no findings
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an error and mark the report invalid
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(message.into());
    }

    /// Record a warning
    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// A single immutable snapshot
///
/// The payload is never mutated after creation; the checksum always matches
/// a successful decompression of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier
    pub id: SnapshotId,
    /// When the snapshot was created
    pub timestamp: DateTime<Utc>,
    /// Hex SHA-256 of the uncompressed canonical payload
    pub checksum: String,
    /// Stored payload
    pub payload: StoredPayload,
    /// Metadata
    pub metadata: SnapshotMetadata,
    /// Graph position
    pub relationships: Relationships,
    /// Validation findings
    pub validation: ValidationReport,
}

impl Snapshot {
    /// Human-readable label
    pub fn summary(&self) -> String {
        if !self.metadata.description.is_empty() {
            self.metadata.description.clone()
        } else if !self.relationships.message.is_empty() {
            self.relationships.message.clone()
        } else {
            format!("Snapshot at {}", self.timestamp.format("%H:%M:%S"))
        }
    }

    /// Canonical payload size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.metadata.size_bytes
    }
}

/// Caller-supplied metadata for a new snapshot
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Author recorded on the snapshot
    pub author: String,
    /// Free-text description
    pub description: String,
    /// Initial tags
    pub tags: BTreeSet<String>,
    /// Pipeline stage that produced the payload
    pub operation: OperationKind,
    /// Kind of change being recorded
    pub change: ChangeKind,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            author: "system".to_string(),
            description: String::new(),
            tags: BTreeSet::new(),
            operation: OperationKind::Manual,
            change: ChangeKind::Update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(description: &str, message: &str) -> Snapshot {
        Snapshot {
            id: SnapshotId::new(),
            timestamp: Utc::now(),
            checksum: "0".repeat(64),
            payload: StoredPayload::Plain { value: json!({"a": 1}) },
            metadata: SnapshotMetadata {
                version: RECORD_VERSION,
                author: "system".to_string(),
                description: description.to_string(),
                tags: BTreeSet::new(),
                size_bytes: 7,
                operation: OperationKind::Manual,
                change: ChangeKind::Update,
            },
            relationships: Relationships {
                parent: None,
                children: Vec::new(),
                branch: "main".to_string(),
                message: message.to_string(),
            },
            validation: ValidationReport::new(),
        }
    }

    // === Summary Tests ===

    #[test]
    fn test_summary_prefers_description() {
        let snapshot = sample("refined mesh", "commit msg");
        assert_eq!(snapshot.summary(), "refined mesh");
    }

    #[test]
    fn test_summary_falls_back_to_message() {
        let snapshot = sample("", "commit msg");
        assert_eq!(snapshot.summary(), "commit msg");
    }

    #[test]
    fn test_summary_timestamp_fallback() {
        let snapshot = sample("", "");
        assert!(snapshot.summary().contains("Snapshot at"));
    }

    // === Id Tests ===

    #[test]
    fn test_ids_are_unique() {
        let a = SnapshotId::new();
        let b = SnapshotId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_display_roundtrip() {
        let id = SnapshotId::new();
        let text = id.to_string();
        let parsed = SnapshotId::from_uuid(text.parse().unwrap());
        assert_eq!(parsed, id);
    }

    // === ValidationReport Tests ===

    #[test]
    fn test_report_starts_valid() {
        let report = ValidationReport::new();
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_error_invalidates_report() {
        let mut report = ValidationReport::new();
        report.push_error("missing field");
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_warning_keeps_report_valid() {
        let mut report = ValidationReport::new();
        report.push_warning("large payload");
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
    }

    // === StoredPayload Tests ===

    #[test]
    fn test_stored_payload_compression_flag() {
        let plain = StoredPayload::Plain { value: json!(1) };
        let packed = StoredPayload::Deflate { bytes: vec![1, 2, 3] };
        assert!(!plain.is_compressed());
        assert!(packed.is_compressed());
    }

    // === Serialization Tests ===

    #[test]
    fn test_snapshot_serialization() {
        let mut snapshot = sample("desc", "msg");
        snapshot.metadata.tags.insert("milestone".to_string());

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, snapshot.id);
        assert_eq!(parsed.checksum, snapshot.checksum);
        assert_eq!(parsed.metadata.tags, snapshot.metadata.tags);
        assert_eq!(parsed.relationships.branch, "main");
    }

    #[test]
    fn test_kind_serialization_is_lowercase() {
        assert_eq!(serde_json::to_string(&OperationKind::Geometry).unwrap(), "\"geometry\"");
        assert_eq!(serde_json::to_string(&ChangeKind::Merge).unwrap(), "\"merge\"");
    }

    #[test]
    fn test_default_options() {
        let options = SnapshotOptions::default();
        assert_eq!(options.author, "system");
        assert_eq!(options.operation, OperationKind::Manual);
        assert_eq!(options.change, ChangeKind::Update);
        assert!(options.tags.is_empty());
    }
}
