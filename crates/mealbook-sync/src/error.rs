//! Error types for the sync engine

use thiserror::Error;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync engine error
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote store failure, propagated unchanged from the client
    #[error("store error: {0}")]
    Store(#[from] mealbook_store_client::StoreError),

    /// Invalid user input, rejected locally before any remote call
    #[error("{0}")]
    Validation(String),
}
