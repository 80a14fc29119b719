//! Lifecycle event notifications

use tokio::sync::broadcast;

use crate::snapshot::SnapshotId;

/// A lifecycle notification
///
/// Events about the same snapshot id are published in causal order; no
/// ordering is promised across different ids.
#[derive(Debug, Clone)]
pub enum VersionEvent {
    /// A snapshot was committed
    SnapshotCreated { id: SnapshotId, branch: String },
    /// A snapshot was restored and became the branch head
    SnapshotRestored { id: SnapshotId, branch: String },
    /// A branch was created
    BranchCreated { name: String },
    /// The active branch changed
    BranchSwitched { from: String, to: String },
    /// A merge completed
    BranchMerged {
        source: String,
        target: String,
        snapshot: Option<SnapshotId>,
        conflicts: usize,
    },
    /// A tag was added to a snapshot
    TagAdded { id: SnapshotId, tag: String },
    /// A tag was removed from a snapshot
    TagRemoved { id: SnapshotId, tag: String },
    /// A snapshot was deleted
    SnapshotDeleted { id: SnapshotId },
    /// A retention sweep finished
    RetentionApplied { removed: usize, failed: usize },
    /// Something went wrong around a snapshot
    SnapshotError {
        id: Option<SnapshotId>,
        message: String,
    },
}

/// Broadcast channel for lifecycle events
pub struct EventBus {
    tx: broadcast::Sender<VersionEvent>,
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<VersionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: VersionEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
