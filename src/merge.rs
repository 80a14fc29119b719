//! Merge strategies and key-level conflict detection
//!
//! Non-overlapping key edits merge cleanly; differing values on the same
//! key produce a conflict marker next to the untouched target value.

use serde_json::{Map, Value};

use crate::snapshot::SnapshotId;

/// How a merge combines two branch heads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Move the target head directly to the source head without combining
    /// content. Ancestry is not checked: on diverged branches this is a
    /// forced move that rewrites the target's history.
    FastForward,
    /// Combine both heads against their nearest common ancestor, marking
    /// key-level conflicts
    ThreeWay,
}

/// Outcome for a single top-level key during a three-way merge
#[derive(Debug, Clone, PartialEq)]
pub enum KeyMerge {
    /// Same value on both sides
    Unchanged,
    /// Present only in the source; copied into the result
    Added(Value),
    /// Different values on each side; the target value stays in place and
    /// the conflict is recorded next to it
    Conflict {
        source: Value,
        target: Value,
        ancestor: Option<Value>,
    },
}

/// Result of merging two payloads
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Combined payload; conflicts are marked under `<key>_conflict`
    pub merged: Value,
    /// Keys that conflicted
    pub conflicts: Vec<String>,
}

impl MergeOutcome {
    /// True when no key conflicted
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Nearest common ancestor of two head-to-root paths
///
/// Scans the source path newest-first and returns the first id that appears
/// anywhere in the target path.
pub fn common_ancestor(
    source_path: &[SnapshotId],
    target_path: &[SnapshotId],
) -> Option<SnapshotId> {
    source_path
        .iter()
        .find(|id| target_path.contains(id))
        .copied()
}

/// Key-level three-way merge of `source` into `target`
///
/// Starts from a copy of the target; keys only in the source are copied in;
/// keys with differing values keep the target value and gain a sibling
/// `<key>_conflict` object holding both sides and the ancestor value.
/// Comparison is shallow: differences nested inside an equal top-level key
/// are not detected.
pub fn merge_payloads(source: &Value, target: &Value, ancestor: Option<&Value>) -> MergeOutcome {
    let empty = Map::new();
    let source_map = source.as_object().unwrap_or(&empty);
    let target_map = target.as_object().unwrap_or(&empty);
    let ancestor_map = ancestor.and_then(Value::as_object);

    let mut merged = target_map.clone();
    let mut conflicts = Vec::new();

    for (key, source_value) in source_map {
        match classify_key(key, source_value, target_map, ancestor_map) {
            KeyMerge::Unchanged => {}
            KeyMerge::Added(value) => {
                merged.insert(key.clone(), value);
            }
            KeyMerge::Conflict {
                source,
                target,
                ancestor,
            } => {
                let mut marker = Map::new();
                marker.insert("source".to_string(), source);
                marker.insert("target".to_string(), target);
                marker.insert("ancestor".to_string(), ancestor.unwrap_or(Value::Null));
                merged.insert(format!("{}_conflict", key), Value::Object(marker));
                conflicts.push(key.clone());
            }
        }
    }

    MergeOutcome {
        merged: Value::Object(merged),
        conflicts,
    }
}

fn classify_key(
    key: &str,
    source_value: &Value,
    target_map: &Map<String, Value>,
    ancestor_map: Option<&Map<String, Value>>,
) -> KeyMerge {
    match target_map.get(key) {
        None => KeyMerge::Added(source_value.clone()),
        Some(target_value) if target_value == source_value => KeyMerge::Unchanged,
        Some(target_value) => KeyMerge::Conflict {
            source: source_value.clone(),
            target: target_value.clone(),
            ancestor: ancestor_map.and_then(|map| map.get(key)).cloned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_merge_non_overlapping() {
        let source = json!({"mesh": {"nodes": [1]}});
        let target = json!({"geometry": {"volume": 2.0}});

        let outcome = merge_payloads(&source, &target, None);
        assert!(outcome.is_clean());
        assert_eq!(outcome.merged["mesh"], json!({"nodes": [1]}));
        assert_eq!(outcome.merged["geometry"], json!({"volume": 2.0}));
    }

    #[test]
    fn test_identical_values_merge_cleanly() {
        let source = json!({"x": 5});
        let target = json!({"x": 5});

        let outcome = merge_payloads(&source, &target, None);
        assert!(outcome.is_clean());
        assert_eq!(outcome.merged, json!({"x": 5}));
    }

    #[test]
    fn test_conflict_keeps_target_and_adds_marker() {
        let source = json!({"x": 2});
        let target = json!({"x": 3});
        let ancestor = json!({"x": 1});

        let outcome = merge_payloads(&source, &target, Some(&ancestor));
        assert_eq!(outcome.conflicts, vec!["x"]);
        assert_eq!(outcome.merged["x"], json!(3));
        assert_eq!(
            outcome.merged["x_conflict"],
            json!({"source": 2, "target": 3, "ancestor": 1})
        );
    }

    #[test]
    fn test_conflict_without_ancestor_records_null() {
        let source = json!({"x": 2});
        let target = json!({"x": 3});

        let outcome = merge_payloads(&source, &target, None);
        assert_eq!(outcome.merged["x_conflict"]["ancestor"], Value::Null);
    }

    #[test]
    fn test_nested_difference_inside_equal_key_is_not_detected() {
        let shared = json!({"deep": {"a": 1}});
        let source = json!({ "block": shared });
        let target = json!({ "block": shared });

        let outcome = merge_payloads(&source, &target, None);
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_common_ancestor_prefers_most_recent_source_entry() {
        let shared_old = SnapshotId::new();
        let shared_new = SnapshotId::new();
        let source_tip = SnapshotId::new();
        let target_tip = SnapshotId::new();

        // Newest first on both paths
        let source_path = vec![source_tip, shared_new, shared_old];
        let target_path = vec![target_tip, shared_new, shared_old];

        assert_eq!(
            common_ancestor(&source_path, &target_path),
            Some(shared_new)
        );
    }

    #[test]
    fn test_common_ancestor_absent_for_unrelated_paths() {
        let source_path = vec![SnapshotId::new(), SnapshotId::new()];
        let target_path = vec![SnapshotId::new()];
        assert_eq!(common_ancestor(&source_path, &target_path), None);
    }

    #[test]
    fn test_merge_into_empty_target_copies_everything() {
        let source = json!({"a": 1, "b": 2});
        let target = json!({});

        let outcome = merge_payloads(&source, &target, None);
        assert!(outcome.is_clean());
        assert_eq!(outcome.merged, json!({"a": 1, "b": 2}));
    }
}
