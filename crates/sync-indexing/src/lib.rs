//! Search index synchronisation for search-sync.
//!
//! This crate keeps an external search index eventually consistent with
//! the primary content store.
//!
//! ## Key Components
//!
//! - [`IndexRegistry`]: entity type to index name, with startup name generators
//! - [`DocumentConverter`]: entity to canonical JSON via per-type [`Crosswalk`]s
//! - [`Denormalizer`]: explodes multi-valued fields into separate documents
//! - [`IndexQueueConsumer`]: event tap writing outbox records
//! - [`DrainWorker`]: pushes outbox records to the index
//! - [`BulkReindexJob`]: rebuilds an index from scratch
//! - [`IndexClient`]: the search backend, with [`HttpIndexClient`] over reqwest
//!
//! ## Architecture
//!
//! 1. Content changes reach the event tap, which queues outbox records
//! 2. The drain worker reads records oldest first and re-reads the live entity
//! 3. The entity is converted and pushed (or deleted) in the index
//! 4. The record is deleted only if it was not re-touched meanwhile
//!
//! The bulk reindex job skips the outbox and pages through the content
//! store directly.

pub mod builder;
pub mod client;
pub mod content;
pub mod converter;
pub mod crosswalk;
pub mod denormalizer;
pub mod drain;
pub mod error;
pub mod mock;
pub mod registry;
pub mod reindex;
pub mod retry;
pub mod tap;

pub use builder::IndexDocumentBuilder;
pub use client::{HttpIndexClient, HttpIndexClientConfig, IndexClient, IndexStatus};
pub use content::ContentStore;
pub use converter::DocumentConverter;
pub use crosswalk::{Crosswalk, MetadataCrosswalk};
pub use denormalizer::Denormalizer;
pub use drain::{DrainConfig, DrainReport, DrainWorker};
pub use error::{IndexClientError, SyncError};
pub use mock::{ClientCall, MockIndexClient};
pub use registry::{DateTemplateGenerator, IndexNameGenerator, IndexRegistry, YearSuffixGenerator};
pub use reindex::{default_index_name, BulkReindexJob, ReindexConfig, ReindexReport};
pub use retry::{push_with_retry, FixedAttempts, PushOutcome, RetryPolicy};
pub use tap::{IndexQueueConsumer, SkipReason, TapBatch, TapOutcome};
