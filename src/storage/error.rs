//! Storage layer error types
//!
//! All errors that can occur in a durable transaction backend are defined here.

use thiserror::Error;

use crate::storage::types::TxId;

/// Errors raised by durable backend operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The transaction is not open. It was never begun or has already finished.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TxId),

    /// A transaction was finished while savepoints nested in it were still open.
    #[error("transaction {tx_id} still has {open} open savepoint(s)")]
    OpenSavepoints { tx_id: TxId, open: usize },

    /// The backend refused the operation.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend's own bookkeeping is inconsistent.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Check if this error means the transaction is not open.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::TransactionNotFound(_))
    }

    /// Check if retrying the operation may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = StorageError::TransactionNotFound(TxId::generate());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retriable());

        let unavailable = StorageError::Unavailable("connection reset".into());
        assert!(!unavailable.is_not_found());
        assert!(unavailable.is_retriable());
    }
}
