//! In-memory document store with savepoint layering.
//!
//! Every open transaction owns a write layer. Reads walk the layer chain
//! from the innermost savepoint outward and fall back to committed data.
//! Committing a savepoint folds its layer into the parent layer; committing
//! a root transaction applies its layer to the committed map.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use crate::storage::backend::TransactionBackend;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{TxHandle, TxId};

/// Pending writes of one open transaction. `None` marks a deletion.
#[derive(Debug, Default)]
struct Layer {
    parent: Option<TxId>,
    writes: BTreeMap<String, Option<Value>>,
}

/// In-memory transactional key/value store.
///
/// Thread-safe: can be shared across threads via Clone (uses Arc internally).
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Durable, committed documents.
    committed: RwLock<BTreeMap<String, Value>>,
    /// Write layers of open transactions, by id.
    layers: Mutex<HashMap<TxId, Layer>>,
    /// Serializes root commits.
    commit_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a document inside an open transaction.
    pub fn put(&self, tx: &TxHandle, key: impl Into<String>, value: Value) -> StorageResult<()> {
        let mut layers = self.inner.layers.lock();
        let layer = layers
            .get_mut(tx.id())
            .ok_or_else(|| StorageError::TransactionNotFound(tx.id().clone()))?;
        layer.writes.insert(key.into(), Some(value));
        Ok(())
    }

    /// Delete a document inside an open transaction.
    pub fn delete(&self, tx: &TxHandle, key: &str) -> StorageResult<()> {
        let mut layers = self.inner.layers.lock();
        let layer = layers
            .get_mut(tx.id())
            .ok_or_else(|| StorageError::TransactionNotFound(tx.id().clone()))?;
        layer.writes.insert(key.to_string(), None);
        Ok(())
    }

    /// Read a document as seen from inside an open transaction.
    pub fn get(&self, tx: &TxHandle, key: &str) -> StorageResult<Option<Value>> {
        let layers = self.inner.layers.lock();
        if !layers.contains_key(tx.id()) {
            return Err(StorageError::TransactionNotFound(tx.id().clone()));
        }

        let mut current = Some(tx.id().clone());
        while let Some(id) = current {
            let Some(layer) = layers.get(&id) else {
                break;
            };
            if let Some(write) = layer.writes.get(key) {
                return Ok(write.clone());
            }
            current = layer.parent.clone();
        }

        Ok(self.inner.committed.read().get(key).cloned())
    }

    /// Read committed data, outside any transaction.
    pub fn get_committed(&self, key: &str) -> Option<Value> {
        self.inner.committed.read().get(key).cloned()
    }

    /// Number of committed documents.
    pub fn len(&self) -> usize {
        self.inner.committed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.committed.read().is_empty()
    }

    /// Number of transactions and savepoints currently open.
    pub fn open_transactions(&self) -> usize {
        self.inner.layers.lock().len()
    }

    fn open_children(layers: &HashMap<TxId, Layer>, id: &TxId) -> usize {
        layers
            .values()
            .filter(|layer| layer.parent.as_ref() == Some(id))
            .count()
    }
}

impl TransactionBackend for MemoryStore {
    fn begin(&self, parent: Option<&TxHandle>) -> StorageResult<TxHandle> {
        let mut layers = self.inner.layers.lock();

        let handle = match parent {
            Some(parent) => {
                if !layers.contains_key(parent.id()) {
                    return Err(StorageError::TransactionNotFound(parent.id().clone()));
                }
                TxHandle::nested(parent)
            }
            None => TxHandle::root(),
        };

        layers.insert(
            handle.id().clone(),
            Layer {
                parent: handle.parent().cloned(),
                writes: BTreeMap::new(),
            },
        );
        debug!(tx_id = %handle.id(), depth = handle.depth(), "memory store: begin");

        Ok(handle)
    }

    fn commit(&self, tx: &TxHandle) -> StorageResult<()> {
        let mut layers = self.inner.layers.lock();

        let open = Self::open_children(&layers, tx.id());
        if open > 0 {
            return Err(StorageError::OpenSavepoints {
                tx_id: tx.id().clone(),
                open,
            });
        }

        let layer = layers
            .remove(tx.id())
            .ok_or_else(|| StorageError::TransactionNotFound(tx.id().clone()))?;

        match layer.parent {
            Some(parent_id) => {
                let parent = layers.get_mut(&parent_id).ok_or_else(|| {
                    StorageError::Internal(format!(
                        "savepoint {} outlived its parent {}",
                        tx.id(),
                        parent_id
                    ))
                })?;
                parent.writes.extend(layer.writes);
            }
            None => {
                let _guard = self.inner.commit_lock.lock();
                let mut committed = self.inner.committed.write();
                for (key, write) in layer.writes {
                    match write {
                        Some(value) => {
                            committed.insert(key, value);
                        }
                        None => {
                            committed.remove(&key);
                        }
                    }
                }
            }
        }
        debug!(tx_id = %tx.id(), depth = tx.depth(), "memory store: commit");

        Ok(())
    }

    fn rollback(&self, tx: &TxHandle) -> StorageResult<()> {
        let mut layers = self.inner.layers.lock();

        let open = Self::open_children(&layers, tx.id());
        if open > 0 {
            return Err(StorageError::OpenSavepoints {
                tx_id: tx.id().clone(),
                open,
            });
        }

        layers
            .remove(tx.id())
            .ok_or_else(|| StorageError::TransactionNotFound(tx.id().clone()))?;
        debug!(tx_id = %tx.id(), depth = tx.depth(), "memory store: rollback");

        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("documents", &self.len())
            .field("open_transactions", &self.open_transactions())
            .finish()
    }
}
