use std::sync::Arc;

use crate::action::{ActionError, ActionResult};
use crate::session::config::EngineConfig;
use crate::session::instrument::{ActionEvent, Instrumentation, SubscriptionId};
use crate::storage::{TransactionBackend, TxHandle};
use crate::transaction::{CommitListener, Outcome, TransactionError, TransactionManager};

struct EngineInner {
    backend: Arc<dyn TransactionBackend>,
    config: EngineConfig,
    instrumentation: Instrumentation,
}

/// Shared entry point: durable backend, configuration and event subscribers.
///
/// Cheap to clone and safe to share across threads. Each thread opens its
/// own [`Session`].
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new<B>(backend: B) -> Self
    where
        B: TransactionBackend + 'static,
    {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config<B>(backend: B, config: EngineConfig) -> Self
    where
        B: TransactionBackend + 'static,
    {
        Self::from_shared(Arc::new(backend), config)
    }

    pub fn from_shared(backend: Arc<dyn TransactionBackend>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                backend,
                config,
                instrumentation: Instrumentation::new(),
            }),
        }
    }

    /// Open a session with an empty transaction stack.
    pub fn session(&self) -> Session {
        Session {
            engine: self.clone(),
            transactions: TransactionManager::new(
                self.inner.backend.clone(),
                self.inner.config.max_depth,
            ),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &Arc<dyn TransactionBackend> {
        &self.inner.backend
    }

    pub fn instrumentation(&self) -> &Instrumentation {
        &self.inner.instrumentation
    }

    /// Shorthand for `instrumentation().subscribe(..)`.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&ActionEvent) + Send + Sync + 'static,
    {
        self.inner.instrumentation.subscribe(subscriber)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("instrumentation", &self.inner.instrumentation)
            .finish()
    }
}

/// One execution context: owns the transaction stack actions run on.
pub struct Session {
    engine: Engine,
    transactions: TransactionManager,
}

impl Session {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// See [`TransactionManager::transaction`].
    pub fn transaction<T, F>(&self, f: F) -> ActionResult<Outcome<T>>
    where
        F: FnOnce() -> ActionResult<T>,
    {
        self.transactions.transaction(f)
    }

    pub fn after_commit<F>(&self, f: F) -> ActionResult<()>
    where
        F: FnOnce() -> ActionResult<()> + 'static,
    {
        self.transactions.after_commit(f)
    }

    pub fn after_commit_listener<L>(&self, listener: L) -> ActionResult<()>
    where
        L: CommitListener + 'static,
    {
        self.transactions.after_commit_listener(listener)
    }

    pub fn depth(&self) -> usize {
        self.transactions.depth()
    }

    pub fn savepoint(&self) -> Option<TxHandle> {
        self.transactions.savepoint()
    }

    /// Innermost savepoint, for writes made by an action body.
    pub fn current_savepoint(&self) -> ActionResult<TxHandle> {
        self.transactions
            .savepoint()
            .ok_or(ActionError::Transaction(TransactionError::NoActiveTransaction))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("depth", &self.depth())
            .field("savepoint", &self.savepoint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Barrier;

    fn setup() -> (MemoryStore, Engine) {
        let store = MemoryStore::new();
        let engine = Engine::new(store.clone());
        (store, engine)
    }

    #[test]
    fn test_current_savepoint() {
        let (store, engine) = setup();
        let session = engine.session();

        assert!(session.current_savepoint().is_err());

        session
            .transaction(|| {
                let tx = session.current_savepoint()?;
                store.put(&tx, "greeting", json!("hello"))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.get_committed("greeting"), Some(json!("hello")));
        assert_eq!(session.depth(), 0);
    }

    #[test]
    fn test_sessions_do_not_share_stacks() {
        let (_store, engine) = setup();
        let first = engine.session();
        let second = engine.session();

        first
            .transaction(|| {
                assert_eq!(first.depth(), 1);
                assert_eq!(second.depth(), 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_sessions_per_thread_are_isolated() {
        let (store, engine) = setup();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [1usize, 3]
            .into_iter()
            .map(|nesting| {
                let engine = engine.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let session = engine.session();
                    let fired = Rc::new(RefCell::new(Vec::new()));

                    fn nest(
                        session: &Session,
                        remaining: usize,
                        barrier: &Barrier,
                        fired: &Rc<RefCell<Vec<usize>>>,
                    ) -> ActionResult<usize> {
                        let outcome = session.transaction(|| {
                            let depth = session.depth();
                            let log = fired.clone();
                            session.after_commit(move || {
                                log.borrow_mut().push(depth);
                                Ok(())
                            })?;
                            if remaining > 1 {
                                return nest(session, remaining - 1, barrier, fired);
                            }
                            barrier.wait();
                            Ok(depth)
                        })?;
                        match outcome {
                            Outcome::Committed(depth) => Ok(depth),
                            Outcome::Aborted => Ok(0),
                        }
                    }

                    let deepest = nest(&session, nesting, &barrier, &fired).unwrap();
                    let fired = fired.borrow().clone();
                    (deepest, session.depth(), fired)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results[0], (1, 0, vec![1]));
        assert_eq!(results[1], (3, 0, vec![1, 2, 3]));
        assert_eq!(store.open_transactions(), 0);
    }

    #[test]
    fn test_max_depth_from_config() {
        let engine = Engine::with_config(MemoryStore::new(), EngineConfig::new().max_depth(1));
        let session = engine.session();

        let err = session
            .transaction(|| session.transaction(|| Ok(())))
            .unwrap_err();
        assert!(matches!(
            err,
            ActionError::Transaction(TransactionError::NestingTooDeep { depth: 1, max: 1 })
        ));
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
