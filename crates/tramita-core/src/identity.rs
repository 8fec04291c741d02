//! Deterministic movement identity.
//!
//! A movement's store id is a SHA-256 digest over its immutable fields as
//! received from the API, which makes insertion idempotent: re-fetching the
//! same response never creates duplicates, and overlapping sync runs are
//! harmless. Absent fields contribute an empty string to the digest, never
//! a `null` placeholder.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::Supplement;

/// Derive the store id for a movement.
///
/// Inputs are the owning process reference, the movement code, the raw
/// event-timestamp string exactly as received (pre-normalization), the
/// tabulated supplements, and the movement's zero-based position within its
/// source batch. Same five inputs always yield the same id.
pub fn movement_id(
    process_ref: &str,
    code: Option<i64>,
    raw_timestamp: Option<&str>,
    supplements: &[Supplement],
    position: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(process_ref.as_bytes());
    if let Some(code) = code {
        hasher.update(code.to_string().as_bytes());
    }
    if let Some(raw) = raw_timestamp {
        hasher.update(raw.as_bytes());
    }
    hasher.update(canonical_supplements(supplements).as_bytes());
    hasher.update(position.to_string().as_bytes());
    hex_digest(&hasher.finalize())
}

/// Serialize supplements in a canonical, key-order-independent form.
///
/// Object keys are emitted in sorted order and absent fields are omitted,
/// so two supplements that differ only in field arrival order hash equal.
pub fn canonical_supplements(supplements: &[Supplement]) -> String {
    let items: Vec<Value> = supplements.iter().map(supplement_value).collect();
    Value::Array(items).to_string()
}

// serde_json's default object map is ordered by key, which gives the sorted
// output this encoding relies on.
fn supplement_value(supplement: &Supplement) -> Value {
    let mut map = serde_json::Map::new();
    if let Some(code) = supplement.code {
        map.insert("codigo".to_string(), code.into());
    }
    if let Some(value) = supplement.value {
        map.insert("valor".to_string(), value.into());
    }
    if let Some(name) = &supplement.name {
        map.insert("nome".to_string(), name.as_str().into());
    }
    if let Some(description) = &supplement.description {
        map.insert("descricao".to_string(), description.as_str().into());
    }
    Value::Object(map)
}

fn hex_digest(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
