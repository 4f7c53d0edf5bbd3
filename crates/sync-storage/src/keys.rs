//! Key encoding and decoding for the storage layer.
//!
//! Outbox queue keys are `outbox:{insertion_micros:020}:{ulid}` so that a
//! forward scan returns records oldest first. Secondary keys let records be
//! found by record id and by item id without scanning the queue.

use crate::error::StorageError;
use ulid::Ulid;

const OUTBOX_PREFIX: &str = "outbox:";

/// Key for a queued outbox record
/// Format: outbox:{insertion_micros:020}:{ulid}
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutboxKey {
    /// Insertion date in microseconds since Unix epoch
    pub insertion_micros: i64,
    /// Record identity
    pub record_id: Ulid,
}

impl OutboxKey {
    pub fn new(insertion_micros: i64, record_id: Ulid) -> Self {
        Self {
            insertion_micros,
            record_id,
        }
    }

    /// Encode key to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        // Zero-pad to keep lexicographic order equal to time order
        format!(
            "{}{:020}:{}",
            OUTBOX_PREFIX, self.insertion_micros, self.record_id
        )
        .into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts[0] != "outbox" {
            return Err(StorageError::Key(format!("Invalid outbox key format: {}", s)));
        }

        let insertion_micros: i64 = parts[1]
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid insertion date: {}", e)))?;
        let record_id: Ulid = parts[2]
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid ULID: {}", e)))?;

        Ok(Self {
            insertion_micros,
            record_id,
        })
    }

    /// Prefix shared by every queue key
    pub fn prefix() -> &'static [u8] {
        OUTBOX_PREFIX.as_bytes()
    }
}

/// Secondary key: record id -> queue key
/// Format: id:{ulid}
pub fn outbox_id_key(record_id: &str) -> Vec<u8> {
    format!("id:{}", record_id).into_bytes()
}

/// Secondary key: item id -> record
/// Format: item:{item_id}:{ulid}
pub fn outbox_item_key(item_id: &str, record_id: &str) -> Vec<u8> {
    format!("item:{}:{}", item_id, record_id).into_bytes()
}

/// Prefix for all records of one item
pub fn outbox_item_prefix(item_id: &str) -> Vec<u8> {
    format!("item:{}:", item_id).into_bytes()
}

/// Split an item key into (item_id, record_id).
pub fn parse_outbox_item_key(bytes: &[u8]) -> Result<(String, String), StorageError> {
    let s = std::str::from_utf8(bytes)
        .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
    let rest = s
        .strip_prefix("item:")
        .ok_or_else(|| StorageError::Key(format!("Invalid item key format: {}", s)))?;
    // Item ids may contain ':'; the record id never does
    let (item_id, record_id) = rest
        .rsplit_once(':')
        .ok_or_else(|| StorageError::Key(format!("Invalid item key format: {}", s)))?;
    Ok((item_id.to_string(), record_id.to_string()))
}

/// Key for an entity
/// Format: entity:{id}
pub fn entity_key(id: &str) -> Vec<u8> {
    format!("entity:{}", id).into_bytes()
}

/// Prefix of the per-type entity index
/// Format: type:{entity_type}:
pub fn entity_type_prefix(entity_type: &str) -> Vec<u8> {
    format!("type:{}:", entity_type).into_bytes()
}

/// Key in the per-type entity index
/// Format: type:{entity_type}:{id}
pub fn entity_type_key(entity_type: &str, id: &str) -> Vec<u8> {
    format!("type:{}:{}", entity_type, id).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_key_roundtrip() {
        let key = OutboxKey::new(1_706_540_400_000_123, Ulid::new());
        let decoded = OutboxKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_outbox_key_lexicographic_order() {
        let earlier = OutboxKey::new(9_999, Ulid::new());
        let later = OutboxKey::new(10_000, Ulid::new());
        assert!(earlier.to_bytes() < later.to_bytes());
    }

    #[test]
    fn test_outbox_key_rejects_other_prefix() {
        assert!(OutboxKey::from_bytes(b"entity:00000000000000000001:abc").is_err());
    }

    #[test]
    fn test_item_key_with_colon_in_item_id() {
        let record_id = Ulid::new().to_string();
        let key = outbox_item_key("hdl:123/45", &record_id);
        let (item_id, parsed_record) = parse_outbox_item_key(&key).unwrap();
        assert_eq!(item_id, "hdl:123/45");
        assert_eq!(parsed_record, record_id);
    }

    #[test]
    fn test_entity_type_key_has_prefix() {
        let key = entity_type_key("Publication", "e1");
        assert!(key.starts_with(&entity_type_prefix("Publication")));
        assert!(!key.starts_with(&entity_type_prefix("Pub")));
    }
}
