// crates/lexis-core/src/hashing.rs
//
// Deterministic hashing helpers behind stable effect IDs and plan hashes.
//
// Materials are serialized to canonical JSON (object keys sorted at every
// depth, no whitespace) before hashing, so the digest does not depend on map
// iteration order or on serde_json feature flags.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::LexisError;

/// Number of hex characters kept from the SHA-256 digest in effect IDs.
pub const STABLE_ID_HEX_LEN: usize = 32;

/// Compute SHA-256 hash of the given bytes.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Serialize `value` to canonical JSON.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, LexisError> {
    let value = serde_json::to_value(value)?;
    let mut out = String::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), LexisError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// Full hex SHA-256 digest of the canonical JSON form of `value`.
pub fn stable_digest<T: Serialize + ?Sized>(value: &T) -> Result<String, LexisError> {
    let canonical = canonical_json(value)?;
    Ok(hex::encode(hash_bytes(canonical.as_bytes())))
}

/// Derive a stable, prefixed identifier from `materials`.
///
/// Identical materials always yield the same ID. If the materials cannot be
/// serialized a random ID with the same prefix and length is returned instead,
/// so ID generation never blocks the pipeline.
pub fn stable_effect_id<T: Serialize + ?Sized>(prefix: &str, materials: &T) -> String {
    match stable_digest(materials) {
        Ok(digest) => format!("{}-{}", prefix, &digest[..STABLE_ID_HEX_LEN]),
        Err(_) => random_effect_id(prefix),
    }
}

/// A fresh, time-ordered identifier with the given prefix.
pub fn random_effect_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::now_v7().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use serde::ser::Error as _;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_hash_bytes() {
        let hash = hash_bytes(b"lupus");
        assert_eq!(hash, hash_bytes(b"lupus"));
        assert_ne!(hash, hash_bytes(b"lupa"));
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = serde_json::json!({"b": 1, "a": {"z": [1, {"y": 2, "x": 3}], "c": null}});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"a":{"c":null,"z":[1,{"x":3,"y":2}]},"b":1}"#
        );
    }

    #[test]
    fn test_digest_independent_of_map_order() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for (k, v) in [("alpha", 1), ("beta", 2), ("gamma", 3), ("delta", 4)] {
            first.insert(k, v);
        }
        for (k, v) in [("delta", 4), ("gamma", 3), ("beta", 2), ("alpha", 1)] {
            second.insert(k, v);
        }
        assert_eq!(stable_digest(&first).unwrap(), stable_digest(&second).unwrap());
    }

    #[test]
    fn test_stable_effect_id_is_deterministic() {
        let a = stable_effect_id("ext", &("call-1", "raw-1"));
        let b = stable_effect_id("ext", &("call-1", "raw-1"));
        assert_eq!(a, b);
        assert!(a.starts_with("ext-"));
        assert_eq!(a.len(), "ext-".len() + STABLE_ID_HEX_LEN);

        assert_ne!(a, stable_effect_id("ext", &("call-2", "raw-1")));
        assert_ne!(a, stable_effect_id("ext", &("call-1", "raw-2")));
    }

    #[test]
    fn test_stable_effect_id_falls_back_to_random() {
        let a = stable_effect_id("drv", &Unserializable);
        let b = stable_effect_id("drv", &Unserializable);
        assert!(a.starts_with("drv-"));
        assert_eq!(a.len(), "drv-".len() + STABLE_ID_HEX_LEN);
        assert_ne!(a, b);
    }
}
