//! Error types for the sync pipeline.

use sync_storage::StorageError;
use thiserror::Error;

/// Errors raised by an [`IndexClient`](crate::IndexClient).
#[derive(Error, Debug)]
pub enum IndexClientError {
    /// Request could not be sent or no response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// Client could not be built
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for IndexClientError {
    fn from(err: reqwest::Error) -> Self {
        IndexClientError::Transport(err.to_string())
    }
}

/// Errors that abort a sync job
#[derive(Error, Debug)]
pub enum SyncError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// External index call failed
    #[error("Index client error: {0}")]
    IndexClient(#[from] IndexClientError),

    /// Primary content store query failed
    #[error("Content store error: {0}")]
    Content(String),

    /// Entity type has no registered index
    #[error("Unsupported entity type: {0}")]
    UnsupportedEntityType(String),

    /// Job parameters are unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Target index could not be reset before a bulk reindex
    #[error("Index reset failed: {0}")]
    IndexReset(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}
