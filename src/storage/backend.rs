//! The durable transaction primitive consumed by the transaction manager.

use crate::storage::error::StorageResult;
use crate::storage::types::TxHandle;

/// A durable store that can open nested transactions.
///
/// Implementations must give savepoint semantics: rolling back a nested
/// handle only undoes the work done through that handle, and committing a
/// nested handle folds its work into the parent without making it durable.
/// Only committing a root handle makes work visible outside the transaction.
///
/// Backends are shared between threads; one backend serves many sessions.
pub trait TransactionBackend: Send + Sync {
    /// Open a root transaction (`parent == None`) or a savepoint nested
    /// inside `parent`.
    fn begin(&self, parent: Option<&TxHandle>) -> StorageResult<TxHandle>;

    /// Commit the transaction or release the savepoint.
    fn commit(&self, tx: &TxHandle) -> StorageResult<()>;

    /// Roll back the transaction or roll back to the savepoint.
    fn rollback(&self, tx: &TxHandle) -> StorageResult<()>;
}
