//! Outbox record type for deferred search index synchronisation.
//!
//! A record notes that an entity changed and still has to be pushed to the
//! external index. Records describe events, not entity state: the drain
//! always re-reads the live entity before pushing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change an outbox record stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Entity was created
    Create,
    /// Entity content changed
    Modify,
    /// Entity was deleted or withdrawn
    Delete,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Create => write!(f, "CREATE"),
            OperationType::Modify => write!(f, "MODIFY"),
            OperationType::Delete => write!(f, "DELETE"),
        }
    }
}

/// A pending sync operation.
///
/// `insertion_date` orders the queue and doubles as the version token the
/// drain compares before deleting a record it has just pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxRecord {
    /// Identity of the record itself (ULID string)
    pub id: String,

    /// Identifier of the changed entity
    pub item_id: String,

    /// What happened to the entity
    pub operation_type: OperationType,

    /// When the record was inserted or last re-touched (microsecond precision)
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub insertion_date: DateTime<Utc>,
}

impl OutboxRecord {
    /// Create a new record.
    pub fn new(
        id: impl Into<String>,
        item_id: impl Into<String>,
        operation_type: OperationType,
        insertion_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            item_id: item_id.into(),
            operation_type,
            insertion_date,
        }
    }

    /// True when `other` carries the same insertion token as this record.
    pub fn is_unmodified_since(&self, other: &OutboxRecord) -> bool {
        self.id == other.id && self.insertion_date == other.insertion_date
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
