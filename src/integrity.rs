//! Content checksums and structural payload validation

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::VersionError;
use crate::snapshot::ValidationReport;

/// Warn when a payload's canonical form exceeds this many bytes
const SIZE_WARNING_BYTES: usize = 100 * 1024 * 1024;

/// Canonical JSON bytes for hashing and sizing
///
/// serde_json keeps object keys sorted, so two payloads with the same
/// logical content serialize identically regardless of insertion order.
pub fn canonical_bytes(payload: &Value) -> Result<Vec<u8>, VersionError> {
    Ok(serde_json::to_vec(payload)?)
}

/// Hex SHA-256 over the canonical payload bytes
pub fn checksum(payload: &Value) -> Result<String, VersionError> {
    Ok(checksum_bytes(&canonical_bytes(payload)?))
}

/// Hex SHA-256 over already-canonical bytes
pub fn checksum_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Run the structural sanity checks
///
/// Findings are recorded on the report; validation never raises and never
/// blocks snapshot creation.
pub fn validate(payload: &Value) -> ValidationReport {
    validate_with_limit(payload, SIZE_WARNING_BYTES)
}

fn validate_with_limit(payload: &Value, size_warning: usize) -> ValidationReport {
    let mut report = ValidationReport::new();

    if payload.is_null() {
        report.push_error("payload is empty");
        return report;
    }

    if let Ok(bytes) = serde_json::to_vec(payload) {
        if bytes.len() > size_warning {
            report.push_warning(format!(
                "payload is {} bytes, snapshots this large will be slow",
                bytes.len()
            ));
        }
    }

    if let Some(map) = payload.as_object() {
        for (key, value) in map {
            let record = match value.as_object() {
                Some(record) => record,
                None => continue,
            };
            match record.get("type").and_then(Value::as_str) {
                Some("geometry") => {
                    if !has_array_field(record, "vertices") || !has_array_field(record, "normals") {
                        report.push_error(format!(
                            "geometry record '{}' needs array-typed vertices and normals",
                            key
                        ));
                    }
                }
                Some("mesh") => {
                    if !has_array_field(record, "nodes") || !has_array_field(record, "elements") {
                        report.push_error(format!(
                            "mesh record '{}' needs array-typed nodes and elements",
                            key
                        ));
                    }
                }
                _ => {}
            }
        }
    }

    report
}

fn has_array_field(record: &serde_json::Map<String, Value>, field: &str) -> bool {
    record.get(field).map(Value::is_array).unwrap_or(false)
}
