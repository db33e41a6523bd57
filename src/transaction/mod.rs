//! Nested transactions with after-commit callbacks.
//!
//! Every call to [`TransactionManager::transaction`] pushes a frame and opens
//! its own savepoint in the durable backend. Callbacks registered while a
//! frame is innermost belong to that frame: they move to the parent when the
//! frame commits and vanish when it rolls back. Once the outermost frame
//! commits, the surviving callbacks run in registration order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionManager                        │
//! │     (frame stack, savepoints, callback promotion, firing)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │   Frame     │       │  Callback   │       │ Transaction │
//!  │ (savepoint) │       │   (queue)   │       │   Backend   │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use txflow::storage::MemoryStore;
//! use txflow::transaction::{Outcome, TransactionManager};
//! use txflow::action::ActionError;
//!
//! let manager = TransactionManager::new(Arc::new(MemoryStore::new()), 16);
//!
//! let outcome = manager.transaction(|| {
//!     manager.after_commit(|| { println!("committed"); Ok(()) })?;
//!     let inner = manager.transaction(|| -> Result<(), ActionError> {
//!         Err(ActionError::Rollback)
//!     })?;
//!     assert_eq!(inner, Outcome::Aborted);
//!     Ok(())
//! }).unwrap();
//! assert!(outcome.is_committed());
//! ```

mod callbacks;
mod error;
mod manager;

pub use callbacks::{Callback, CommitCallback, CommitListener};
pub use error::{TransactionError, TransactionResult};
pub use manager::{Outcome, TransactionManager};

pub(crate) use callbacks::run_all;
