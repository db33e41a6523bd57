//! Transaction manager - the nested transaction stack of one session.
//!
//! The TransactionManager is the main entry point for transactions.
//! It handles:
//! - Opening one savepoint per nesting level
//! - Collecting after-commit callbacks per frame
//! - Promoting callbacks to the parent frame on a clean commit
//! - Discarding a frame's callbacks when it unwinds with an error
//! - Firing the surviving callbacks once the outermost frame commits

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::action::{ActionError, ActionResult};
use crate::storage::{StorageResult, TransactionBackend, TxHandle};
use crate::transaction::callbacks::{run_all, Callback, CommitListener};
use crate::transaction::error::{TransactionError, TransactionResult};

/// How a transactional block finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The block returned normally and its frame committed.
    Committed(T),
    /// The block raised the rollback sentinel; only its frame was undone.
    Aborted,
}

impl<T> Outcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted)
    }

    /// The committed value, if any.
    pub fn committed(self) -> Option<T> {
        match self {
            Outcome::Committed(value) => Some(value),
            Outcome::Aborted => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Committed(value) => Outcome::Committed(f(value)),
            Outcome::Aborted => Outcome::Aborted,
        }
    }
}

/// One nesting level.
struct Frame {
    savepoint: TxHandle,
    callbacks: Vec<Callback>,
}

/// Nested transaction stack.
///
/// Not thread-safe by construction (`!Sync`): every execution context owns
/// its own manager, so no stack state is ever shared.
pub struct TransactionManager {
    backend: Arc<dyn TransactionBackend>,
    max_depth: usize,
    frames: RefCell<Vec<Frame>>,
}

impl TransactionManager {
    /// Create a manager driving `backend`, refusing to nest deeper than `max_depth`.
    pub fn new(backend: Arc<dyn TransactionBackend>, max_depth: usize) -> Self {
        Self {
            backend,
            max_depth,
            frames: RefCell::new(Vec::new()),
        }
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Handle of the innermost open savepoint.
    pub fn savepoint(&self) -> Option<TxHandle> {
        self.frames
            .borrow()
            .last()
            .map(|frame| frame.savepoint.clone())
    }

    /// Run `f` inside a new frame.
    ///
    /// A clean return commits the frame. `Err(ActionError::Rollback)` undoes
    /// only this frame and yields `Outcome::Aborted`. Any other error undoes
    /// this frame and is returned unchanged, so every enclosing frame unwinds
    /// with it.
    pub fn transaction<T, F>(&self, f: F) -> ActionResult<Outcome<T>>
    where
        F: FnOnce() -> ActionResult<T>,
    {
        self.open_frame()?;

        let mut guard = FrameGuard {
            manager: self,
            armed: true,
        };
        let result = f();
        guard.armed = false;

        let frame = self.pop_frame()?;

        match result {
            Ok(value) => {
                self.commit_frame(frame)?;
                Ok(Outcome::Committed(value))
            }
            Err(err) if err.is_rollback() => {
                self.discard_frame(frame, &err)
                    .map_err(TransactionError::from)?;
                Ok(Outcome::Aborted)
            }
            Err(err) => {
                if let Err(rollback_err) = self.discard_frame(frame, &err) {
                    warn!(error = %rollback_err, "rollback failed while unwinding");
                }
                Err(err)
            }
        }
    }

    /// Push a frame with a fresh savepoint nested in the current one.
    fn open_frame(&self) -> TransactionResult<()> {
        let depth = self.depth();
        if depth >= self.max_depth {
            return Err(TransactionError::NestingTooDeep {
                depth,
                max: self.max_depth,
            });
        }

        let parent = self.savepoint();
        let savepoint = self.backend.begin(parent.as_ref())?;
        debug!(tx_id = %savepoint.id(), depth = savepoint.depth(), "frame opened");
        self.frames.borrow_mut().push(Frame {
            savepoint,
            callbacks: Vec::new(),
        });
        Ok(())
    }

    fn pop_frame(&self) -> TransactionResult<Frame> {
        self.frames
            .borrow_mut()
            .pop()
            .ok_or_else(|| TransactionError::Internal("frame stack underflow".into()))
    }

    /// Defer `f` until the outermost frame commits.
    ///
    /// Outside any transaction there is nothing to wait for and `f` runs
    /// immediately.
    pub fn after_commit<F>(&self, f: F) -> ActionResult<()>
    where
        F: FnOnce() -> ActionResult<()> + 'static,
    {
        self.enqueue(Callback::Closure(Box::new(f)))
    }

    /// Defer a listener's commit callbacks until the outermost frame commits.
    pub fn after_commit_listener<L>(&self, listener: L) -> ActionResult<()>
    where
        L: CommitListener + 'static,
    {
        self.enqueue(Callback::Listener(Box::new(listener)))
    }

    fn enqueue(&self, callback: Callback) -> ActionResult<()> {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.callbacks.push(callback);
            return Ok(());
        }
        callback.run()
    }

    fn commit_frame(&self, frame: Frame) -> ActionResult<()> {
        let Frame {
            savepoint,
            callbacks,
        } = frame;

        if let Err(err) = self.backend.commit(&savepoint) {
            warn!(
                tx_id = %savepoint.id(),
                error = %err,
                discarded = callbacks.len(),
                "commit failed, discarding frame"
            );
            if let Err(rollback_err) = self.backend.rollback(&savepoint) {
                debug!(tx_id = %savepoint.id(), error = %rollback_err, "rollback after failed commit");
            }
            return Err(TransactionError::from(err).into());
        }

        {
            let mut frames = self.frames.borrow_mut();
            if let Some(parent) = frames.last_mut() {
                debug!(
                    tx_id = %savepoint.id(),
                    promoted = callbacks.len(),
                    "savepoint released"
                );
                parent.callbacks.extend(callbacks);
                return Ok(());
            }
        }

        debug!(
            tx_id = %savepoint.id(),
            callbacks = callbacks.len(),
            "transaction committed"
        );
        run_all(callbacks.into_iter().map(|callback| move || callback.run()))
    }

    fn discard_frame(&self, frame: Frame, cause: &ActionError) -> StorageResult<()> {
        debug!(
            tx_id = %frame.savepoint.id(),
            depth = frame.savepoint.depth(),
            discarded = frame.callbacks.len(),
            cause = cause.kind(),
            "frame rolled back"
        );
        self.backend.rollback(&frame.savepoint)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("depth", &self.depth())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// Pops and rolls back the frame if `f` panics.
struct FrameGuard<'a> {
    manager: &'a TransactionManager,
    armed: bool,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let frame = match self.manager.frames.try_borrow_mut() {
            Ok(mut frames) => frames.pop(),
            Err(_) => None,
        };
        if let Some(frame) = frame {
            let _ = self.manager.backend.rollback(&frame.savepoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use serde_json::json;

    use crate::storage::MemoryStore;

    fn setup() -> (MemoryStore, TransactionManager) {
        let store = MemoryStore::new();
        let manager = TransactionManager::new(Arc::new(store.clone()), 64);
        (store, manager)
    }

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, entry: &'static str) -> impl FnOnce() -> ActionResult<()> {
        let log = log.clone();
        move || {
            log.borrow_mut().push(entry);
            Ok(())
        }
    }

    #[test]
    fn test_commit_fires_callbacks_once_at_root() {
        let (store, manager) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));

        let outcome = manager
            .transaction(|| {
                let tx = manager.savepoint().unwrap();
                store.put(&tx, "a", json!(1))?;
                manager.after_commit(record(&log, "first"))?;
                manager.after_commit(record(&log, "second"))?;
                assert!(log.borrow().is_empty());
                Ok(42)
            })
            .unwrap();

        assert_eq!(outcome, Outcome::Committed(42));
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(store.get_committed("a"), Some(json!(1)));
        assert_eq!(manager.depth(), 0);
    }

    #[test]
    fn test_nested_callbacks_fire_in_registration_order() {
        let (_store, manager) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));

        manager
            .transaction(|| {
                manager.after_commit(record(&log, "outer-1"))?;
                manager.transaction(|| {
                    assert_eq!(manager.depth(), 2);
                    manager.after_commit(record(&log, "inner"))?;
                    Ok(())
                })?;
                // Promoted, not fired yet.
                assert!(log.borrow().is_empty());
                manager.after_commit(record(&log, "outer-2"))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(*log.borrow(), vec!["outer-1", "inner", "outer-2"]);
    }

    #[test]
    fn test_rollback_sentinel_aborts_only_innermost_frame() {
        let (store, manager) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));

        manager
            .transaction(|| {
                store.put(&manager.savepoint().unwrap(), "outer", json!(true))?;
                manager.after_commit(record(&log, "outer"))?;

                let inner = manager.transaction(|| -> ActionResult<()> {
                    store.put(&manager.savepoint().unwrap(), "inner", json!(true))?;
                    manager.after_commit(record(&log, "inner"))?;
                    Err(ActionError::Rollback)
                })?;
                assert!(inner.is_aborted());

                manager.after_commit(record(&log, "after-inner"))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(*log.borrow(), vec!["outer", "after-inner"]);
        assert_eq!(store.get_committed("outer"), Some(json!(true)));
        assert!(store.get_committed("inner").is_none());
    }

    #[test]
    fn test_rollback_sentinel_at_depth_n() {
        let (_store, manager) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let names = ["d1", "d2", "d3", "d4"];

        fn nest(
            manager: &TransactionManager,
            log: &Rc<RefCell<Vec<&'static str>>>,
            names: &[&'static str],
        ) -> ActionResult<()> {
            let (name, rest) = names.split_first().unwrap();
            manager.after_commit(record(log, *name))?;
            if rest.is_empty() {
                return Err(ActionError::Rollback);
            }
            let outcome = manager.transaction(|| nest(manager, log, rest))?;
            assert_eq!(outcome.is_aborted(), rest.len() == 1);
            Ok(())
        }

        let outcome = manager.transaction(|| nest(&manager, &log, &names)).unwrap();
        assert!(outcome.is_committed());
        assert_eq!(*log.borrow(), vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn test_error_unwinds_every_frame() {
        let (store, manager) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));

        let err = manager
            .transaction(|| {
                store.put(&manager.savepoint().unwrap(), "a", json!(1))?;
                manager.after_commit(record(&log, "outer"))?;
                manager.transaction(|| {
                    manager.after_commit(record(&log, "middle"))?;
                    manager.transaction(|| -> ActionResult<()> {
                        manager.after_commit(record(&log, "inner"))?;
                        Err(ActionError::business("disk on fire"))
                    })?;
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, ActionError::Business(_)));
        assert_eq!(err.to_string(), "disk on fire");
        assert!(log.borrow().is_empty());
        assert!(store.is_empty());
        assert_eq!(store.open_transactions(), 0);
        assert_eq!(manager.depth(), 0);
    }

    #[test]
    fn test_callback_failure_reraises_first() {
        let (_store, manager) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));

        let err = manager
            .transaction(|| {
                manager.after_commit(record(&log, "one"))?;
                manager.after_commit(|| Err(ActionError::business("first failure")))?;
                manager.after_commit(record(&log, "three"))?;
                manager.after_commit(|| Err(ActionError::business("second failure")))?;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.to_string(), "first failure");
        assert_eq!(*log.borrow(), vec!["one", "three"]);
    }

    #[test]
    fn test_nesting_limit() {
        let store = MemoryStore::new();
        let manager = TransactionManager::new(Arc::new(store.clone()), 2);

        let err = manager
            .transaction(|| {
                manager.transaction(|| manager.transaction(|| Ok(())))?;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(
            err,
            ActionError::Transaction(TransactionError::NestingTooDeep { depth: 2, max: 2 })
        ));
        assert_eq!(store.open_transactions(), 0);
    }

    #[test]
    fn test_after_commit_outside_transaction_runs_immediately() {
        let (_store, manager) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));

        manager.after_commit(record(&log, "now")).unwrap();
        assert_eq!(*log.borrow(), vec!["now"]);
    }

    #[test]
    fn test_panic_pops_frame() {
        let (store, manager) = setup();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = manager.transaction(|| -> ActionResult<()> { panic!("boom") });
        }));

        assert!(result.is_err());
        assert_eq!(manager.depth(), 0);
        assert_eq!(store.open_transactions(), 0);
    }
}
