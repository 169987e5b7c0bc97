use common::OrderId;
use thiserror::Error;

/// Errors that can occur when interacting with the checkout store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with this id already exists.
    #[error("Duplicate order: {0}")]
    DuplicateOrder(OrderId),

    /// The transaction could not be committed. Nothing was applied.
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
