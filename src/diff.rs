//! Key-level payload comparison

use serde::Serialize;
use serde_json::Value;

/// One key present on both sides with different values
#[derive(Debug, Clone, Serialize)]
pub struct ModifiedKey {
    /// Top-level key
    pub key: String,
    /// Value on the older side
    pub old_value: Value,
    /// Value on the newer side
    pub new_value: Value,
}

/// Key-level difference between two payloads
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotDiff {
    /// Keys present only in the newer payload
    pub added: Vec<String>,
    /// Keys present only in the older payload
    pub removed: Vec<String>,
    /// Keys present in both with differing values
    pub modified: Vec<ModifiedKey>,
}

impl SnapshotDiff {
    /// True when nothing changed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of changed keys
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Counts per category
    pub fn stats(&self) -> DiffStats {
        DiffStats {
            added: self.added.len(),
            removed: self.removed.len(),
            modified: self.modified.len(),
            total: self.total_changes(),
        }
    }
}

/// Change counts per category
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub total: usize,
}

/// Compare two payloads at top-level key granularity
///
/// Value equality is structural, so key order inside nested objects does
/// not register as a change. Non-object payloads compare as empty key sets.
pub fn compare(old: &Value, new: &Value) -> SnapshotDiff {
    let empty = serde_json::Map::new();
    let old_map = old.as_object().unwrap_or(&empty);
    let new_map = new.as_object().unwrap_or(&empty);

    let mut diff = SnapshotDiff::default();

    for (key, new_value) in new_map {
        match old_map.get(key) {
            None => diff.added.push(key.clone()),
            Some(old_value) if old_value != new_value => diff.modified.push(ModifiedKey {
                key: key.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            }),
            _ => {}
        }
    }

    for key in old_map.keys() {
        if !new_map.contains_key(key) {
            diff.removed.push(key.clone());
        }
    }

    diff
}
