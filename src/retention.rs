//! Retention policy - which old snapshots are eligible for deletion

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::branch::Branch;
use crate::snapshot::{Snapshot, SnapshotId};
use crate::store::SnapshotStore;

/// Rules for automatic history pruning
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Snapshots older than this many days become eligible
    pub keep_days: i64,
    /// Per-branch history length before the tail becomes eligible
    pub max_versions_per_branch: usize,
    /// Tags that exempt a snapshot from automatic deletion
    pub protected_tags: HashSet<String>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_days: 30,
            max_versions_per_branch: 50,
            protected_tags: ["milestone", "release", "backup"]
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
        }
    }
}

impl RetentionPolicy {
    /// First protected tag carried by the snapshot, if any
    pub fn protected_tag(&self, snapshot: &Snapshot) -> Option<String> {
        snapshot
            .metadata
            .tags
            .iter()
            .find(|tag| self.protected_tags.contains(tag.as_str()))
            .cloned()
    }
}

/// Snapshot ids eligible for deletion under `policy`
///
/// Branch heads and protected-tagged snapshots are never marked. A snapshot
/// is eligible when it is older than `keep_days`, or when it sits past the
/// per-branch history cap. Deletion itself is attempted elsewhere and may
/// still refuse individual ids.
pub fn plan(
    store: &SnapshotStore,
    branches: &[Branch],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<SnapshotId> {
    let heads: HashSet<SnapshotId> = branches.iter().filter_map(|branch| branch.head).collect();
    let cutoff = now - Duration::days(policy.keep_days);

    let mut marked = Vec::new();
    let mut seen = HashSet::new();

    for id in store.ids() {
        let snapshot = match store.get(&id) {
            Some(snapshot) => snapshot,
            None => continue,
        };
        if heads.contains(&id) || policy.protected_tag(&snapshot).is_some() {
            continue;
        }
        if snapshot.timestamp < cutoff && seen.insert(id) {
            marked.push(id);
        }
    }

    // The walk is capped a little past the limit; anything deeper ages out
    // through the keep_days rule on later sweeps.
    for branch in branches {
        let history = store.history_from(branch.head, policy.max_versions_per_branch + 10);
        for snapshot in history.iter().skip(policy.max_versions_per_branch) {
            if heads.contains(&snapshot.id) || policy.protected_tag(snapshot).is_some() {
                continue;
            }
            if seen.insert(snapshot.id) {
                marked.push(snapshot.id);
            }
        }
    }

    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{
        ChangeKind, OperationKind, Relationships, SnapshotMetadata, StoredPayload,
        ValidationReport, RECORD_VERSION,
    };
    use serde_json::json;
    use std::collections::BTreeSet;

    fn aged_snapshot(parent: Option<SnapshotId>, age_days: i64, tags: &[&str]) -> Snapshot {
        Snapshot {
            id: SnapshotId::new(),
            timestamp: Utc::now() - Duration::days(age_days),
            checksum: String::new(),
            payload: StoredPayload::Plain { value: json!({}) },
            metadata: SnapshotMetadata {
                version: RECORD_VERSION,
                author: "system".to_string(),
                description: String::new(),
                tags: tags.iter().map(|tag| tag.to_string()).collect::<BTreeSet<_>>(),
                size_bytes: 2,
                operation: OperationKind::Manual,
                change: ChangeKind::Update,
            },
            relationships: Relationships {
                parent,
                children: Vec::new(),
                branch: "main".to_string(),
                message: String::new(),
            },
            validation: ValidationReport::new(),
        }
    }

    fn branch(name: &str, head: Option<SnapshotId>) -> Branch {
        Branch {
            name: name.to_string(),
            head,
            created: Utc::now(),
            last_modified: Utc::now(),
            description: String::new(),
            is_protected: false,
        }
    }

    #[test]
    fn test_old_snapshot_is_marked() {
        let store = SnapshotStore::new();
        let old = aged_snapshot(None, 90, &[]);
        let old_id = old.id;
        store.insert(old);
        let head = aged_snapshot(Some(old_id), 0, &[]);
        let head_id = head.id;
        store.insert(head);

        let marked = plan(
            &store,
            &[branch("main", Some(head_id))],
            &RetentionPolicy::default(),
            Utc::now(),
        );
        assert_eq!(marked, vec![old_id]);
    }

    #[test]
    fn test_head_is_never_marked() {
        let store = SnapshotStore::new();
        let head = aged_snapshot(None, 365, &[]);
        let head_id = head.id;
        store.insert(head);

        let marked = plan(
            &store,
            &[branch("main", Some(head_id))],
            &RetentionPolicy::default(),
            Utc::now(),
        );
        assert!(marked.is_empty());
    }

    #[test]
    fn test_protected_tag_survives() {
        let store = SnapshotStore::new();
        let pinned = aged_snapshot(None, 365, &["milestone"]);
        let pinned_id = pinned.id;
        store.insert(pinned);
        let head = aged_snapshot(Some(pinned_id), 0, &[]);
        let head_id = head.id;
        store.insert(head);

        let marked = plan(
            &store,
            &[branch("main", Some(head_id))],
            &RetentionPolicy::default(),
            Utc::now(),
        );
        assert!(marked.is_empty());
    }

    #[test]
    fn test_zero_keep_days_marks_everything_but_head() {
        let store = SnapshotStore::new();
        let first = aged_snapshot(None, 0, &[]);
        let first_id = first.id;
        store.insert(first);
        let head = aged_snapshot(Some(first_id), 0, &[]);
        let head_id = head.id;
        store.insert(head);

        let policy = RetentionPolicy {
            keep_days: 0,
            ..RetentionPolicy::default()
        };
        let marked = plan(&store, &[branch("main", Some(head_id))], &policy, Utc::now());
        assert_eq!(marked, vec![first_id]);
    }

    #[test]
    fn test_branch_cap_marks_history_tail() {
        let store = SnapshotStore::new();
        let mut parent = None;
        let mut ids = Vec::new();
        for _ in 0..5 {
            let snapshot = aged_snapshot(parent, 0, &[]);
            parent = Some(snapshot.id);
            ids.push(snapshot.id);
            store.insert(snapshot);
        }
        let head_id = *ids.last().unwrap();

        let policy = RetentionPolicy {
            keep_days: 365,
            max_versions_per_branch: 3,
            ..RetentionPolicy::default()
        };
        let marked = plan(&store, &[branch("main", Some(head_id))], &policy, Utc::now());

        // history newest-first is ids reversed; entries past the cap are the
        // two oldest commits
        assert_eq!(marked.len(), 2);
        assert!(marked.contains(&ids[0]));
        assert!(marked.contains(&ids[1]));
    }

    #[test]
    fn test_shared_history_is_marked_once() {
        let store = SnapshotStore::new();
        let shared = aged_snapshot(None, 90, &[]);
        let shared_id = shared.id;
        store.insert(shared);
        let head_a = aged_snapshot(Some(shared_id), 0, &[]);
        let head_a_id = head_a.id;
        store.insert(head_a);
        let head_b = aged_snapshot(Some(shared_id), 0, &[]);
        let head_b_id = head_b.id;
        store.insert(head_b);

        let policy = RetentionPolicy {
            keep_days: 30,
            max_versions_per_branch: 1,
            ..RetentionPolicy::default()
        };
        let marked = plan(
            &store,
            &[branch("main", Some(head_a_id)), branch("work", Some(head_b_id))],
            &policy,
            Utc::now(),
        );
        assert_eq!(marked, vec![shared_id]);
    }
}
