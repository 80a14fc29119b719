//! Branch registry - named pointers into the snapshot graph

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::VersionError;
use crate::snapshot::SnapshotId;

/// A named, movable pointer to a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Unique name
    pub name: String,
    /// Latest snapshot on this branch; None for a fresh branch
    pub head: Option<SnapshotId>,
    /// When the branch was created
    pub created: DateTime<Utc>,
    /// Last head move
    pub last_modified: DateTime<Utc>,
    /// Free-text description
    pub description: String,
    /// Reserved; not enforced anywhere yet
    pub is_protected: bool,
}

/// Registry of branches plus the pointer new commits land on
///
/// Branches are never deleted, so a name that once resolved keeps resolving.
pub struct BranchRegistry {
    branches: RwLock<HashMap<String, Branch>>,
    current: RwLock<String>,
}

impl BranchRegistry {
    /// Create a registry holding a single fresh default branch
    pub fn new(default_branch: &str) -> Self {
        let now = Utc::now();
        let branch = Branch {
            name: default_branch.to_string(),
            head: None,
            created: now,
            last_modified: now,
            description: "Default branch".to_string(),
            is_protected: false,
        };
        let mut branches = HashMap::new();
        branches.insert(branch.name.clone(), branch);
        Self {
            branches: RwLock::new(branches),
            current: RwLock::new(default_branch.to_string()),
        }
    }

    /// Create a branch anchored at `head`
    pub fn create(
        &self,
        name: &str,
        head: Option<SnapshotId>,
        description: &str,
    ) -> Result<Branch, VersionError> {
        let mut branches = self.branches.write();
        if branches.contains_key(name) {
            return Err(VersionError::BranchExists(name.to_string()));
        }
        let now = Utc::now();
        let branch = Branch {
            name: name.to_string(),
            head,
            created: now,
            last_modified: now,
            description: description.to_string(),
            is_protected: false,
        };
        branches.insert(name.to_string(), branch.clone());
        Ok(branch)
    }

    /// Make `name` the branch new commits land on; returns the previous name
    pub fn switch(&self, name: &str) -> Result<String, VersionError> {
        if !self.branches.read().contains_key(name) {
            return Err(VersionError::BranchNotFound(name.to_string()));
        }
        let mut current = self.current.write();
        let previous = current.clone();
        *current = name.to_string();
        Ok(previous)
    }

    /// Look up a branch by name
    pub fn get(&self, name: &str) -> Result<Branch, VersionError> {
        self.branches
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| VersionError::BranchNotFound(name.to_string()))
    }

    /// Name of the active branch
    pub fn current_name(&self) -> String {
        self.current.read().clone()
    }

    /// Head of the named branch
    pub fn head(&self, name: &str) -> Result<Option<SnapshotId>, VersionError> {
        Ok(self.get(name)?.head)
    }

    /// Move the named branch's head
    pub fn set_head(&self, name: &str, head: Option<SnapshotId>) -> Result<(), VersionError> {
        let mut branches = self.branches.write();
        let branch = branches
            .get_mut(name)
            .ok_or_else(|| VersionError::BranchNotFound(name.to_string()))?;
        branch.head = head;
        branch.last_modified = Utc::now();
        Ok(())
    }

    /// Branch for which `id` is the head, if any
    pub fn head_of(&self, id: &SnapshotId) -> Option<String> {
        self.branches
            .read()
            .values()
            .find(|branch| branch.head == Some(*id))
            .map(|branch| branch.name.clone())
    }

    /// All current head ids
    pub fn heads(&self) -> HashSet<SnapshotId> {
        self.branches
            .read()
            .values()
            .filter_map(|branch| branch.head)
            .collect()
    }

    /// All branches, sorted by name
    pub fn list(&self) -> Vec<Branch> {
        let mut branches: Vec<_> = self.branches.read().values().cloned().collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        branches
    }

    /// Number of branches
    pub fn count(&self) -> usize {
        self.branches.read().len()
    }
}
