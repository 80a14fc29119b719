//! Version control coordinator

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::branch::{Branch, BranchRegistry};
use crate::compress::{CompressionGateway, DEFAULT_WORKER_TIMEOUT};
use crate::diff::{self, SnapshotDiff};
use crate::error::VersionError;
use crate::events::{EventBus, VersionEvent};
use crate::integrity;
use crate::merge::{self, MergeStrategy};
use crate::retention::{self, RetentionPolicy};
use crate::snapshot::{
    ChangeKind, Relationships, Snapshot, SnapshotId, SnapshotMetadata, SnapshotOptions,
    RECORD_VERSION,
};
use crate::store::SnapshotStore;

/// Configuration for the version manager
#[derive(Debug, Clone)]
pub struct VersionConfig {
    /// Name of the branch that exists from the start
    pub default_branch: String,
    /// Compress payloads on write
    pub compression: bool,
    /// Watchdog for compression worker round trips
    pub compression_timeout: Duration,
    /// Automatic pruning rules
    pub retention: RetentionPolicy,
    /// Run the retention sweep after every commit
    pub sweep_on_create: bool,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            compression: false,
            compression_timeout: DEFAULT_WORKER_TIMEOUT,
            retention: RetentionPolicy::default(),
            sweep_on_create: true,
            event_capacity: 64,
        }
    }
}

/// Aggregate store counters
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Stored snapshots
    pub snapshot_count: usize,
    /// Known branches
    pub branch_count: usize,
    /// Sum of canonical payload sizes
    pub total_payload_bytes: u64,
    /// Active branch name
    pub current_branch: String,
    /// Active branch head
    pub current_head: Option<SnapshotId>,
}

/// Coordinates snapshots, branches, merging and retention
///
/// Every read-modify-write of the content table and a branch head runs
/// behind one commit lock, so interleaved commits on the same branch cannot
/// drop a head update. Compression round trips happen outside the lock.
pub struct VersionManager {
    config: VersionConfig,
    store: SnapshotStore,
    branches: BranchRegistry,
    gateway: CompressionGateway,
    events: EventBus,
    commit_lock: Mutex<()>,
}

impl VersionManager {
    /// Create a new manager
    ///
    /// With compression enabled the gateway spawns its worker task, so this
    /// must be called from within a tokio runtime.
    pub fn new(config: VersionConfig) -> Self {
        let gateway = if config.compression {
            CompressionGateway::with_worker(config.compression_timeout)
        } else {
            CompressionGateway::disabled()
        };
        Self {
            store: SnapshotStore::new(),
            branches: BranchRegistry::new(&config.default_branch),
            gateway,
            events: EventBus::new(config.event_capacity),
            commit_lock: Mutex::new(()),
            config,
        }
    }

    /// Commit a payload on the current branch and return the new id
    ///
    /// Validation findings are recorded on the snapshot but never block the
    /// commit, so history reflects what actually happened, including invalid
    /// states.
    pub async fn create_snapshot(
        &self,
        payload: Value,
        options: SnapshotOptions,
        message: &str,
    ) -> Result<SnapshotId, VersionError> {
        let branch = self.branches.current_name();
        self.commit(&branch, payload, options, message).await
    }

    /// Restore a snapshot's payload and move the current branch head to it
    ///
    /// Restoring is a commit-pointer move, not just a read. The payload is
    /// re-hashed after decompression; a mismatch against the stored checksum
    /// means corruption and fails the restore.
    pub async fn restore_to_snapshot(&self, id: SnapshotId) -> Result<Value, VersionError> {
        let snapshot = self
            .store
            .get(&id)
            .ok_or(VersionError::SnapshotNotFound(id))?;
        let payload = self.gateway.decompress(&snapshot.payload).await?;

        let actual = integrity::checksum(&payload)?;
        if actual != snapshot.checksum {
            self.events.publish(VersionEvent::SnapshotError {
                id: Some(id),
                message: "checksum mismatch on restore".to_string(),
            });
            return Err(VersionError::Integrity {
                id,
                expected: snapshot.checksum.clone(),
                actual,
            });
        }

        let branch = self.branches.current_name();
        {
            let _lock = self.commit_lock.lock();
            self.branches.set_head(&branch, Some(id))?;
        }

        info!(snapshot_id = %id, branch = %branch, "Restored snapshot");
        self.events
            .publish(VersionEvent::SnapshotRestored { id, branch });
        Ok(payload)
    }

    /// Create a branch anchored at `from`, or at the current head
    pub fn create_branch(
        &self,
        name: &str,
        from: Option<SnapshotId>,
        description: &str,
    ) -> Result<Branch, VersionError> {
        let head = match from {
            Some(id) => {
                if !self.store.contains(&id) {
                    return Err(VersionError::SnapshotNotFound(id));
                }
                Some(id)
            }
            None => self.branches.head(&self.branches.current_name())?,
        };
        let branch = self.branches.create(name, head, description)?;
        info!(branch = name, head = ?head.map(|id| id.to_string()), "Created branch");
        self.events.publish(VersionEvent::BranchCreated {
            name: name.to_string(),
        });
        Ok(branch)
    }

    /// Change which branch subsequent commits land on
    pub fn switch_branch(&self, name: &str) -> Result<(), VersionError> {
        let previous = self.branches.switch(name)?;
        debug!(from = %previous, to = name, "Switched branch");
        self.events.publish(VersionEvent::BranchSwitched {
            from: previous,
            to: name.to_string(),
        });
        Ok(())
    }

    /// Merge `source` into `target` (the current branch when `target` is None)
    ///
    /// Returns the merge snapshot id for a three-way merge, the moved-to head
    /// for a fast-forward, or None when there was nothing to merge.
    pub async fn merge_branch(
        &self,
        source: &str,
        target: Option<&str>,
        strategy: MergeStrategy,
    ) -> Result<Option<SnapshotId>, VersionError> {
        let target_name = match target {
            Some(name) => name.to_string(),
            None => self.branches.current_name(),
        };
        let source_branch = self.branches.get(source)?;
        let target_branch = self.branches.get(&target_name)?;

        match strategy {
            MergeStrategy::FastForward => {
                {
                    let _lock = self.commit_lock.lock();
                    self.branches.set_head(&target_name, source_branch.head)?;
                }
                info!(source, target = %target_name, "Fast-forward merge");
                self.events.publish(VersionEvent::BranchMerged {
                    source: source.to_string(),
                    target: target_name,
                    snapshot: source_branch.head,
                    conflicts: 0,
                });
                Ok(source_branch.head)
            }
            MergeStrategy::ThreeWay => {
                let source_head = match source_branch.head {
                    Some(id) => id,
                    None => {
                        debug!(source, "Source branch has no commits, nothing to merge");
                        return Ok(None);
                    }
                };

                let source_path = self.store.path_from(Some(source_head));
                let target_path = self.store.path_from(target_branch.head);
                let ancestor_id = merge::common_ancestor(&source_path, &target_path);

                let source_payload = self.payload_of(source_head).await?;
                let target_payload = match target_branch.head {
                    Some(id) => self.payload_of(id).await?,
                    None => Value::Object(Default::default()),
                };
                let ancestor_payload = match ancestor_id {
                    Some(id) => Some(self.payload_of(id).await?),
                    None => None,
                };

                let outcome = merge::merge_payloads(
                    &source_payload,
                    &target_payload,
                    ancestor_payload.as_ref(),
                );
                let conflicts = outcome.conflicts.len();

                let mut options = SnapshotOptions::default();
                options.change = ChangeKind::Merge;
                options.tags.insert("merge".to_string());
                options.description = format!("Merge '{}' into '{}'", source, target_name);
                let message = format!("Merged branch '{}' into '{}'", source, target_name);
                let id = self
                    .commit(&target_name, outcome.merged, options, &message)
                    .await?;

                info!(source, target = %target_name, snapshot_id = %id, conflicts, "Three-way merge");
                self.events.publish(VersionEvent::BranchMerged {
                    source: source.to_string(),
                    target: target_name,
                    snapshot: Some(id),
                    conflicts,
                });
                Ok(Some(id))
            }
        }
    }

    /// Key-level diff between two snapshots
    pub async fn compare_snapshots(
        &self,
        a: SnapshotId,
        b: SnapshotId,
    ) -> Result<SnapshotDiff, VersionError> {
        let old = self.payload_of(a).await?;
        let new = self.payload_of(b).await?;
        Ok(diff::compare(&old, &new))
    }

    /// Snapshots on a branch, newest first, up to `limit` entries
    pub fn get_history(
        &self,
        branch: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Snapshot>, VersionError> {
        let name = match branch {
            Some(name) => name.to_string(),
            None => self.branches.current_name(),
        };
        let head = self.branches.head(&name)?;
        Ok(self.store.history_from(head, limit))
    }

    /// Add a tag to a snapshot
    pub fn add_tag(&self, id: SnapshotId, tag: &str) -> Result<(), VersionError> {
        if self.store.add_tag(&id, tag)? {
            debug!(snapshot_id = %id, tag, "Added tag");
            self.events.publish(VersionEvent::TagAdded {
                id,
                tag: tag.to_string(),
            });
        }
        Ok(())
    }

    /// Remove a tag from a snapshot
    pub fn remove_tag(&self, id: SnapshotId, tag: &str) -> Result<(), VersionError> {
        if self.store.remove_tag(&id, tag)? {
            debug!(snapshot_id = %id, tag, "Removed tag");
            self.events.publish(VersionEvent::TagRemoved {
                id,
                tag: tag.to_string(),
            });
        }
        Ok(())
    }

    /// All branches, sorted by name
    pub fn get_branches(&self) -> Vec<Branch> {
        self.branches.list()
    }

    /// Name of the active branch
    pub fn get_current_branch(&self) -> String {
        self.branches.current_name()
    }

    /// Get a snapshot by id
    pub fn get_snapshot(&self, id: SnapshotId) -> Option<Snapshot> {
        self.store.get(&id)
    }

    /// Delete a snapshot, failing loudly when it is protected
    ///
    /// The deleted node's children are re-parented onto its own parent, so
    /// the graph stays connected.
    pub fn delete_snapshot(&self, id: SnapshotId) -> Result<(), VersionError> {
        let _lock = self.commit_lock.lock();
        let snapshot = self
            .store
            .get(&id)
            .ok_or(VersionError::SnapshotNotFound(id))?;
        if let Some(branch) = self.branches.head_of(&id) {
            return Err(VersionError::HeadProtected { id, branch });
        }
        if let Some(tag) = self.config.retention.protected_tag(&snapshot) {
            return Err(VersionError::TagProtected { id, tag });
        }
        self.store.remove(&id)?;
        info!(snapshot_id = %id, "Deleted snapshot");
        self.events.publish(VersionEvent::SnapshotDeleted { id });
        Ok(())
    }

    /// Run the retention sweep; returns how many snapshots were removed
    ///
    /// Advisory and best-effort: an id that became protected since planning
    /// is logged and skipped, never raised. One summary event is published
    /// at the end.
    pub fn apply_retention(&self) -> usize {
        let marked = retention::plan(
            &self.store,
            &self.branches.list(),
            &self.config.retention,
            Utc::now(),
        );
        if marked.is_empty() {
            return 0;
        }

        let mut removed = 0;
        let mut failed = 0;
        for id in marked {
            match self.delete_snapshot(id) {
                Ok(()) => removed += 1,
                Err(error) => {
                    failed += 1;
                    warn!(snapshot_id = %id, %error, "Retention skipped a snapshot");
                }
            }
        }

        debug!(removed, failed, "Applied retention policy");
        self.events
            .publish(VersionEvent::RetentionApplied { removed, failed });
        removed
    }

    /// Aggregate counters
    pub fn get_statistics(&self) -> StoreStats {
        let current_branch = self.branches.current_name();
        let current_head = self.branches.head(&current_branch).ok().flatten();
        StoreStats {
            snapshot_count: self.store.len(),
            branch_count: self.branches.count(),
            total_payload_bytes: self.store.total_payload_bytes(),
            current_branch,
            current_head,
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<VersionEvent> {
        self.events.subscribe()
    }

    /// Tear down background machinery
    ///
    /// The manager stays usable afterwards; payload transforms run on the
    /// synchronous in-thread path.
    pub fn shutdown(&self) {
        self.gateway.shutdown();
        debug!("Version manager shut down");
    }

    // === Private Methods ===

    async fn commit(
        &self,
        branch: &str,
        payload: Value,
        options: SnapshotOptions,
        message: &str,
    ) -> Result<SnapshotId, VersionError> {
        let canonical = integrity::canonical_bytes(&payload)?;
        let checksum = integrity::checksum_bytes(&canonical);
        let validation = integrity::validate(&payload);
        let validation_errors = if validation.is_valid {
            None
        } else {
            Some(validation.errors.join("; "))
        };

        // Compression happens before the commit section so the lock is
        // never held across an await
        let stored = self.gateway.compress(&payload).await?;

        let id = SnapshotId::new();
        {
            let _lock = self.commit_lock.lock();
            let parent = self.branches.head(branch)?;
            let snapshot = Snapshot {
                id,
                timestamp: Utc::now(),
                checksum,
                payload: stored,
                metadata: SnapshotMetadata {
                    version: RECORD_VERSION,
                    author: options.author,
                    description: options.description,
                    tags: options.tags,
                    size_bytes: canonical.len() as u64,
                    operation: options.operation,
                    change: options.change,
                },
                relationships: Relationships {
                    parent,
                    children: Vec::new(),
                    branch: branch.to_string(),
                    message: message.to_string(),
                },
                validation,
            };
            self.store.insert(snapshot);
            self.branches.set_head(branch, Some(id))?;
        }

        info!(snapshot_id = %id, branch, "Created snapshot");
        self.events.publish(VersionEvent::SnapshotCreated {
            id,
            branch: branch.to_string(),
        });
        if let Some(message) = validation_errors {
            self.events.publish(VersionEvent::SnapshotError {
                id: Some(id),
                message,
            });
        }

        if self.config.sweep_on_create {
            self.apply_retention();
        }

        Ok(id)
    }

    async fn payload_of(&self, id: SnapshotId) -> Result<Value, VersionError> {
        let snapshot = self
            .store
            .get(&id)
            .ok_or(VersionError::SnapshotNotFound(id))?;
        self.gateway.decompress(&snapshot.payload).await
    }
}
