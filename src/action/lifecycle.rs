//! Before / around / after execute hooks.

use std::fmt;
use std::sync::Arc;

use crate::action::error::ActionResult;
use crate::session::Session;

/// Runs before or after the execute step, inside the action's transaction.
pub type Hook<A> = Arc<dyn Fn(&mut A, &Session) -> ActionResult<()> + Send + Sync>;

/// Wraps the execute step. Not calling the continuation skips the body and
/// rolls the action's frame back.
pub type Around<A> =
    Arc<dyn Fn(&mut A, &mut dyn FnMut(&mut A) -> ActionResult<()>) -> ActionResult<()> + Send + Sync>;

pub struct Lifecycle<A> {
    pub(crate) before: Vec<Hook<A>>,
    pub(crate) around: Vec<Around<A>>,
    pub(crate) after: Vec<Hook<A>>,
}

impl<A> Lifecycle<A> {
    pub fn new() -> Self {
        Self {
            before: Vec::new(),
            around: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn before<F>(&mut self, hook: F)
    where
        F: Fn(&mut A, &Session) -> ActionResult<()> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
    }

    pub fn around<F>(&mut self, hook: F)
    where
        F: Fn(&mut A, &mut dyn FnMut(&mut A) -> ActionResult<()>) -> ActionResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.around.push(Arc::new(hook));
    }

    pub fn after<F>(&mut self, hook: F)
    where
        F: Fn(&mut A, &Session) -> ActionResult<()> + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
    }

    /// Before hooks, then the around chain (first declared is outermost)
    /// around `body`, then after hooks. After hooks only run when the body
    /// did.
    pub(crate) fn run(
        &self,
        action: &mut A,
        session: &Session,
        body: &mut dyn FnMut(&mut A) -> ActionResult<()>,
    ) -> ActionResult<()> {
        for hook in &self.before {
            hook(action, session)?;
        }
        let mut ran = false;
        run_around(&self.around, action, &mut |action: &mut A| {
            ran = true;
            body(action)
        })?;
        if !ran {
            return Ok(());
        }
        for hook in &self.after {
            hook(action, session)?;
        }
        Ok(())
    }
}

fn run_around<A>(
    hooks: &[Around<A>],
    action: &mut A,
    body: &mut dyn FnMut(&mut A) -> ActionResult<()>,
) -> ActionResult<()> {
    match hooks.split_first() {
        None => body(action),
        Some((hook, rest)) => hook(action, &mut |action: &mut A| run_around(rest, action, &mut *body)),
    }
}

impl<A> Default for Lifecycle<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Lifecycle<A> {
    fn clone(&self) -> Self {
        Self {
            before: self.before.clone(),
            around: self.around.clone(),
            after: self.after.clone(),
        }
    }
}

impl<A> fmt::Debug for Lifecycle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("before", &self.before.len())
            .field("around", &self.around.len())
            .field("after", &self.after.len())
            .finish()
    }
}
