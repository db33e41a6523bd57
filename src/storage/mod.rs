//! storage layer for txflow
//!
//! This module defines the durable transaction primitive the transaction
//! manager drives, plus an in-memory implementation of it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionBackend                        │
//! │      (begin / commit / rollback with savepoint semantics)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       ┌─────────────┐
//!                       │ MemoryStore │
//!                       │  (layers)   │
//!                       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use serde_json::json;
//! use txflow::storage::{MemoryStore, TransactionBackend};
//!
//! let store = MemoryStore::new();
//! let root = store.begin(None).unwrap();
//! let savepoint = store.begin(Some(&root)).unwrap();
//! store.put(&savepoint, "users/1", json!({"name": "Alice"})).unwrap();
//! store.rollback(&savepoint).unwrap();
//! store.commit(&root).unwrap();
//! assert!(store.get_committed("users/1").is_none());
//! ```

mod backend;
mod error;
mod memory;
mod types;

pub use backend::TransactionBackend;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use types::{TxHandle, TxId};
