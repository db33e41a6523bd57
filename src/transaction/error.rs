//! Transaction error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur while driving the transaction stack.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Opening another frame would exceed the configured nesting limit.
    #[error("transaction nesting too deep: depth {depth} reached the limit of {max}")]
    NestingTooDeep { depth: usize, max: usize },

    /// An operation needed an open transaction and there was none.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Internal error.
    #[error("internal transaction error: {0}")]
    Internal(String),
}

impl TransactionError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransactionError::Storage(e) if e.is_retriable())
    }
}
