//! Content-derived unit identity.
//!
//! Every unit in the logical, physical and business models is identified by a
//! 128-bit BLAKE3 digest of its natural key, hex encoded. The id is computed
//! once when the unit is constructed and never recomputed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digest bytes kept for an id.
pub const ID_SIZE: usize = 16;

/// Separator used when deriving an id from a composite key.
pub const KEY_PART_SEPARATOR: char = '\x1f';

/// Hex-encoded content-derived identifier of a unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Wrap an already computed id, e.g. one read back from a catalog store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        UnitId(raw.into())
    }

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UnitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the id of a unit from its natural key.
pub fn assign_id(natural_key: &str) -> UnitId {
    digest(natural_key.as_bytes())
}

/// Derive an id from a composite natural key.
///
/// A single part yields the same id as [`assign_id`].
pub fn assign_id_from_parts<S: AsRef<str>>(parts: &[S]) -> UnitId {
    let mut sep = [0u8; 4];
    let sep = KEY_PART_SEPARATOR.encode_utf8(&mut sep).as_bytes();

    let mut hasher = blake3::Hasher::new();
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            hasher.update(sep);
        }
        hasher.update(part.as_ref().as_bytes());
    }
    truncate(hasher.finalize())
}

fn digest(bytes: &[u8]) -> UnitId {
    truncate(blake3::hash(bytes))
}

fn truncate(hash: blake3::Hash) -> UnitId {
    UnitId(hex::encode(&hash.as_bytes()[..ID_SIZE]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_id_is_deterministic() {
        assert_eq!(assign_id("orders"), assign_id("orders"));
    }

    #[test]
    fn test_distinct_keys_distinct_ids() {
        let keys = ["orders", "order", "customer", "customer.id", "Orders", ""];
        let ids: std::collections::HashSet<_> = keys.iter().map(|k| assign_id(k)).collect();
        assert_eq!(ids.len(), keys.len());
    }

    #[test]
    fn test_id_format() {
        let id = assign_id("customer");
        assert_eq!(id.as_str().len(), ID_SIZE * 2);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_parts_match_single_key() {
        assert_eq!(assign_id_from_parts(&["orders"]), assign_id("orders"));
        assert_eq!(
            assign_id_from_parts(&["orders", "id"]),
            assign_id("orders\x1fid")
        );
        assert_ne!(
            assign_id_from_parts(&["orders", "id"]),
            assign_id_from_parts(&["ordersid"])
        );
    }

    #[test]
    fn test_serde_transparent() {
        let id = assign_id("customer");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: UnitId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
