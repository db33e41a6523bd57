//! After-commit callbacks.

use std::fmt;

use tracing::error;

use crate::action::{ActionError, ActionResult};

/// Deferred work run once the outermost transaction commits.
pub type CommitCallback = Box<dyn FnOnce() -> ActionResult<()>>;

/// An object that owns a batch of commit callbacks.
///
/// Actions register one of these per performance so their `after_commit`
/// hooks run together, in the position the action took in the queue.
pub trait CommitListener {
    fn run_commit_callbacks(self: Box<Self>) -> ActionResult<()>;
}

/// One entry of a frame's pending list.
pub enum Callback {
    Closure(CommitCallback),
    Listener(Box<dyn CommitListener>),
}

impl Callback {
    pub fn run(self) -> ActionResult<()> {
        match self {
            Callback::Closure(f) => f(),
            Callback::Listener(listener) => listener.run_commit_callbacks(),
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Closure(_) => f.write_str("Callback::Closure"),
            Callback::Listener(_) => f.write_str("Callback::Listener"),
        }
    }
}

/// Run every callback in order, even after failures.
///
/// Returns the first failure; the others are logged.
pub(crate) fn run_all<I, F>(callbacks: I) -> ActionResult<()>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> ActionResult<()>,
{
    let mut first: Option<ActionError> = None;

    for callback in callbacks {
        if let Err(err) = callback() {
            if first.is_none() {
                first = Some(err);
            } else {
                error!(
                    error_kind = err.kind(),
                    error = %err,
                    detail = ?err,
                    "after-commit callback failed"
                );
            }
        }
    }

    match first {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_run_all_attempts_every_callback() {
        let ran = Rc::new(RefCell::new(Vec::new()));

        let callbacks: Vec<CommitCallback> = (0..4)
            .map(|i| {
                let ran = ran.clone();
                Box::new(move || {
                    ran.borrow_mut().push(i);
                    if i == 1 || i == 3 {
                        Err(ActionError::business(format!("callback {} failed", i)))
                    } else {
                        Ok(())
                    }
                }) as CommitCallback
            })
            .collect();

        let err = run_all(callbacks).unwrap_err();
        assert_eq!(err.to_string(), "callback 1 failed");
        assert_eq!(*ran.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_listener_callback() {
        struct Flag(Rc<RefCell<bool>>);

        impl CommitListener for Flag {
            fn run_commit_callbacks(self: Box<Self>) -> ActionResult<()> {
                *self.0.borrow_mut() = true;
                Ok(())
            }
        }

        let flag = Rc::new(RefCell::new(false));
        Callback::Listener(Box::new(Flag(flag.clone()))).run().unwrap();
        assert!(*flag.borrow());
    }
}
