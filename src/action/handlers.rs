//! Exception handler registry.
//!
//! Handlers are (matcher, handler) pairs kept in declaration order. A raised
//! error is resolved by walking its chain (the error itself, then each
//! `source()`) and taking, at the first link anything accepts, the earliest
//! declared entry whose matcher accepts it.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::action::error::ActionError;

type Matcher = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;
type HandlerFn<A> = Arc<dyn Fn(&mut A, &(dyn Error + 'static)) + Send + Sync>;

struct HandlerEntry<A> {
    label: String,
    matcher: Matcher,
    handler: HandlerFn<A>,
}

impl<A> Clone for HandlerEntry<A> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            matcher: self.matcher.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// Append-only list of error handlers for one action definition.
pub struct HandlerRegistry<A> {
    entries: Vec<HandlerEntry<A>>,
}

/// A handler picked for a specific link of an error chain.
pub struct Resolved<'r, 'e, A> {
    entry: &'r HandlerEntry<A>,
    link: &'e (dyn Error + 'static),
}

impl<A> Resolved<'_, '_, A> {
    /// What the handler was registered for.
    pub fn label(&self) -> &str {
        &self.entry.label
    }

    /// The link of the chain that matched.
    pub fn error(&self) -> &(dyn Error + 'static) {
        self.link
    }

    pub fn invoke(&self, action: &mut A) {
        (self.entry.handler)(action, self.link);
    }
}

impl<A> HandlerRegistry<A> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a handler for errors of type `E`.
    pub fn handle<E, F>(&mut self, handler: F)
    where
        E: Error + 'static,
        F: Fn(&mut A, &E) + Send + Sync + 'static,
    {
        self.entries.push(HandlerEntry {
            label: std::any::type_name::<E>().to_string(),
            matcher: Arc::new(|err: &(dyn Error + 'static)| err.is::<E>()),
            handler: Arc::new(move |action: &mut A, err: &(dyn Error + 'static)| {
                if let Some(err) = err.downcast_ref::<E>() {
                    handler(action, err);
                }
            }),
        });
    }

    /// Register a handler for every error accepted by `matcher`.
    pub fn handle_if<M, F>(&mut self, label: impl Into<String>, matcher: M, handler: F)
    where
        M: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
        F: Fn(&mut A, &(dyn Error + 'static)) + Send + Sync + 'static,
    {
        self.entries.push(HandlerEntry {
            label: label.into(),
            matcher: Arc::new(matcher),
            handler: Arc::new(handler),
        });
    }

    /// Find the handler for `error`, if any.
    ///
    /// The rollback sentinel never resolves.
    pub fn resolve<'r, 'e>(&'r self, error: &'e ActionError) -> Option<Resolved<'r, 'e, A>> {
        if error.is_rollback() {
            return None;
        }

        let mut link = Some(error.raised());
        while let Some(current) = link {
            if let Some(entry) = self.entries.iter().find(|entry| (entry.matcher)(current)) {
                return Some(Resolved {
                    entry,
                    link: current,
                });
            }
            link = current.source();
        }
        None
    }

    /// Run the handler for `error` against `action`.
    ///
    /// Returns false when nothing resolved; the caller re-raises.
    pub fn invoke(&self, action: &mut A, error: &ActionError) -> bool {
        match self.resolve(error) {
            Some(resolved) => {
                resolved.invoke(action);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for HandlerRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for HandlerRegistry<A> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<A> fmt::Debug for HandlerRegistry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.label))
            .finish()
    }
}
