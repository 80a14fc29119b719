//! # Stratum
//!
//! Snapshot version control for modeling pipeline artifacts - branch, merge,
//! and a safe way back.
//!
//! This crate provides:
//! - Checksummed, optionally compressed snapshots of opaque payloads
//! - Named branches over a single-parent commit graph
//! - Fast-forward and three-way merges with key-level conflict marking
//! - Key-level comparison between any two snapshots
//! - Retention sweeps that protect branch heads and tagged snapshots
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     VersionManager                      │
//! │  ┌───────────────┐  ┌────────────────┐  ┌────────────┐ │
//! │  │ SnapshotStore │  │ BranchRegistry │  │  EventBus  │ │
//! │  │  (id → node)  │  │ (name → head)  │  │ (broadcast)│ │
//! │  └───────────────┘  └────────────────┘  └────────────┘ │
//! │          │                   │                         │
//! │          ▼                   ▼                         │
//! │  ┌───────────────────────────────────────────────────┐ │
//! │  │ integrity (checksum + validate)                   │ │
//! │  │ compress  (worker transform, timeout fallback)    │ │
//! │  │ merge · diff · retention                          │ │
//! │  └───────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use stratum::{MergeStrategy, SnapshotOptions, VersionConfig, VersionManager};
//!
//! let manager = VersionManager::new(VersionConfig::default());
//!
//! // Commit a payload on the current branch
//! let id = manager.create_snapshot(payload, SnapshotOptions::default(), "initial geometry").await?;
//!
//! // Branch off, work, and merge back
//! manager.create_branch("refinement", None, "mesh refinement trials")?;
//! manager.switch_branch("refinement")?;
//! manager.merge_branch("refinement", Some("main"), MergeStrategy::ThreeWay).await?;
//!
//! // Restore moves the current branch head back to the snapshot
//! let payload = manager.restore_to_snapshot(id).await?;
//! ```

pub mod branch;
pub mod compress;
pub mod diff;
pub mod error;
pub mod events;
pub mod integrity;
pub mod manager;
pub mod merge;
pub mod retention;
pub mod snapshot;
pub mod store;

pub use branch::{Branch, BranchRegistry};
pub use compress::CompressionGateway;
pub use diff::{DiffStats, ModifiedKey, SnapshotDiff};
pub use error::VersionError;
pub use events::{EventBus, VersionEvent};
pub use manager::{StoreStats, VersionConfig, VersionManager};
pub use merge::{KeyMerge, MergeOutcome, MergeStrategy};
pub use retention::RetentionPolicy;
pub use snapshot::{
    ChangeKind, OperationKind, Snapshot, SnapshotId, SnapshotMetadata, SnapshotOptions,
    StoredPayload, ValidationReport,
};
pub use store::SnapshotStore;
