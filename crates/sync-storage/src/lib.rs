//! Storage layer for search-sync.
//!
//! Provides RocksDB-backed storage with:
//! - A persistent FIFO outbox ordered by insertion date
//! - Record-id and item-id lookups into the outbox
//! - Drain transactions with atomic commit and rollback on drop
//! - An entity store with paged enumeration by type

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod outbox;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::OutboxKey;
pub use outbox::OutboxTransaction;
