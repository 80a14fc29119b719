//! In-memory snapshot content table
//!
//! Owns the immutable snapshot records and their parent/child links. Policy
//! (head protection, tag protection) lives in the coordinator; this table
//! only knows the graph.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::VersionError;
use crate::snapshot::{Snapshot, SnapshotId};

/// Content table of snapshots keyed by id
pub struct SnapshotStore {
    snapshots: RwLock<HashMap<SnapshotId, Snapshot>>,
}

impl SnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a snapshot and register it in its parent's child list
    pub fn insert(&self, snapshot: Snapshot) {
        let mut snapshots = self.snapshots.write();
        if let Some(parent_id) = snapshot.relationships.parent {
            if let Some(parent) = snapshots.get_mut(&parent_id) {
                parent.relationships.children.push(snapshot.id);
            }
        }
        debug!(snapshot_id = %snapshot.id, "Inserted snapshot");
        snapshots.insert(snapshot.id, snapshot);
    }

    /// Get a snapshot by id
    pub fn get(&self, id: &SnapshotId) -> Option<Snapshot> {
        self.snapshots.read().get(id).cloned()
    }

    /// Check whether an id exists
    pub fn contains(&self, id: &SnapshotId) -> bool {
        self.snapshots.read().contains_key(id)
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }

    /// All stored ids
    pub fn ids(&self) -> Vec<SnapshotId> {
        self.snapshots.read().keys().copied().collect()
    }

    /// Remove a snapshot, re-parenting its children onto its own parent
    ///
    /// The parent's child list absorbs the removed node's children, so the
    /// graph stays connected with no orphaned subgraphs.
    pub fn remove(&self, id: &SnapshotId) -> Result<Snapshot, VersionError> {
        let mut snapshots = self.snapshots.write();
        let removed = snapshots
            .remove(id)
            .ok_or(VersionError::SnapshotNotFound(*id))?;

        let parent_id = removed.relationships.parent;
        for child_id in &removed.relationships.children {
            if let Some(child) = snapshots.get_mut(child_id) {
                child.relationships.parent = parent_id;
            }
        }
        if let Some(parent_id) = parent_id {
            if let Some(parent) = snapshots.get_mut(&parent_id) {
                parent.relationships.children.retain(|child| child != id);
                parent
                    .relationships
                    .children
                    .extend(removed.relationships.children.iter().copied());
            }
        }

        debug!(snapshot_id = %id, "Removed snapshot");
        Ok(removed)
    }

    /// Add a tag; returns true when the tag was not already present
    pub fn add_tag(&self, id: &SnapshotId, tag: &str) -> Result<bool, VersionError> {
        let mut snapshots = self.snapshots.write();
        let snapshot = snapshots
            .get_mut(id)
            .ok_or(VersionError::SnapshotNotFound(*id))?;
        Ok(snapshot.metadata.tags.insert(tag.to_string()))
    }

    /// Remove a tag; returns true when the tag was present
    pub fn remove_tag(&self, id: &SnapshotId, tag: &str) -> Result<bool, VersionError> {
        let mut snapshots = self.snapshots.write();
        let snapshot = snapshots
            .get_mut(id)
            .ok_or(VersionError::SnapshotNotFound(*id))?;
        Ok(snapshot.metadata.tags.remove(tag))
    }

    /// Walk parent links from `head`, newest first, up to `limit` entries
    pub fn history_from(&self, head: Option<SnapshotId>, limit: usize) -> Vec<Snapshot> {
        let snapshots = self.snapshots.read();
        let mut history = Vec::new();
        let mut cursor = head;
        while let Some(id) = cursor {
            if history.len() >= limit {
                break;
            }
            match snapshots.get(&id) {
                Some(snapshot) => {
                    cursor = snapshot.relationships.parent;
                    history.push(snapshot.clone());
                }
                None => break,
            }
        }
        history
    }

    /// Ids along the parent chain from `head` to the root, newest first
    pub fn path_from(&self, head: Option<SnapshotId>) -> Vec<SnapshotId> {
        let snapshots = self.snapshots.read();
        let mut path = Vec::new();
        let mut cursor = head;
        while let Some(id) = cursor {
            match snapshots.get(&id) {
                Some(snapshot) => {
                    path.push(id);
                    cursor = snapshot.relationships.parent;
                }
                None => break,
            }
        }
        path
    }

    /// Sum of canonical payload sizes across all snapshots
    pub fn total_payload_bytes(&self) -> u64 {
        self.snapshots
            .read()
            .values()
            .map(|snapshot| snapshot.metadata.size_bytes)
            .sum()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
