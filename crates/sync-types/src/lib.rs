//! # sync-types
//!
//! Shared domain types for search-sync.
//!
//! - [`OutboxRecord`]: a pending change waiting to be pushed to the search index
//! - [`Entity`]: an entity from the primary content store
//! - [`ContentEvent`]: a content-change notification fed to the event tap
//! - [`Settings`]: layered configuration

pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod outbox;

pub use config::{EntitySettings, IndexSettings, Settings, SyncSettings};
pub use entity::Entity;
pub use error::ConfigError;
pub use event::{ContentEvent, EventKind, Subject};
pub use outbox::{OperationType, OutboxRecord};
