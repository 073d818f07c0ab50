use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the storefront stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The row lock for a product could not be acquired within the bounded
    /// wait, or the database aborted the waiter to resolve a deadlock.
    /// Callers treat this as a retryable concurrent stock change.
    #[error("Lock wait for product {0} timed out or deadlocked")]
    LockContended(ProductId),

    /// An order row carried a status string the ledger does not recognize.
    #[error("Unrecognized order status: {0}")]
    InvalidStatus(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
