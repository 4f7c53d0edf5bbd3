//! Content-change notifications delivered to the event tap.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::outbox::OperationType;

/// What happened to the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Create,
    Modify,
    /// Only metadata changed (may also carry a withdrawal)
    ModifyMetadata,
    Delete,
    Add,
    Remove,
}

impl EventKind {
    /// Outbox operation a plain CREATE/MODIFY/DELETE notification maps to.
    pub fn operation_type(&self) -> Option<OperationType> {
        match self {
            EventKind::Create => Some(OperationType::Create),
            EventKind::Modify => Some(OperationType::Modify),
            EventKind::Delete => Some(OperationType::Delete),
            _ => None,
        }
    }
}

/// Subject of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subject {
    /// An indexable content entity
    Entity(Entity),
    /// Anything else (collections, users, bitstreams...)
    Other { subject_type: String, id: String },
}

/// A single content-change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEvent {
    pub kind: EventKind,
    pub subject: Subject,
}

impl ContentEvent {
    /// Notification about an entity.
    pub fn for_entity(kind: EventKind, entity: Entity) -> Self {
        Self {
            kind,
            subject: Subject::Entity(entity),
        }
    }

    /// Notification about a non-entity subject.
    pub fn for_other(kind: EventKind, subject_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            subject: Subject::Other {
                subject_type: subject_type.into(),
                id: id.into(),
            },
        }
    }

    /// The subject entity, if the subject is one.
    pub fn entity(&self) -> Option<&Entity> {
        match &self.subject {
            Subject::Entity(entity) => Some(entity),
            Subject::Other { .. } => None,
        }
    }
}
