use serde_json::Value;
use sha2::{Digest, Sha256};

/// Parse raw memory text into a stats snapshot. The snapshot is treated as
/// opaque: any well-formed JSON document is forwarded untouched.
pub fn parse_stats(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

/// Nest the snapshot under a namespace key, or pass it through unchanged.
pub fn apply_prefix(stats: Value, prefix: Option<&str>) -> Value {
    match prefix {
        Some(key) => {
            let mut wrapped = serde_json::Map::with_capacity(1);
            wrapped.insert(key.to_string(), stats);
            Value::Object(wrapped)
        }
        None => stats,
    }
}

/// Canonical serialization of the submission payload. `serde_json` keeps map
/// keys sorted, so equal snapshots serialize to equal bytes across
/// invocations.
pub fn stable_stats_json(payload: &Value) -> String {
    serde_json::to_string(payload).expect("serialization of a decoded payload should not fail")
}

/// SHA-256 hex digest over the canonical serialization. Logged on every
/// submission so unchanged memory snapshots are recognizable downstream.
pub fn payload_fingerprint(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_stats_json(payload).as_bytes());
    format!("{:x}", hasher.finalize())
}
