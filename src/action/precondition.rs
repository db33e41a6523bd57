//! Precondition engine.
//!
//! ```text
//!   PreconditionSet<A>
//!     ├── PreconditionEntry (only_if / unless gates)
//!     │     └── Arc<dyn Precondition<A>>
//!     │           ├── inline closure
//!     │           ├── PerformerPresent, AttributePresent
//!     │           └── Embedded (another action's preconditions)
//!     └── ...
//! ```
//!
//! Every entry runs on each evaluation; failures accumulate. A failing
//! precondition records its message under `base`, or under its group.

use std::fmt;
use std::ops::Add;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::action::policy::Performer;
use crate::action::Action;
use crate::validation::{Errors, BASE};

/// A declined precondition, in the order it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPrecondition {
    pub message: String,
    pub group: Option<String>,
}

/// Sink handed to each precondition check.
pub struct PreconditionContext<'a> {
    errors: &'a mut Errors,
    failed: &'a mut Vec<FailedPrecondition>,
}

impl<'a> PreconditionContext<'a> {
    pub(crate) fn new(errors: &'a mut Errors, failed: &'a mut Vec<FailedPrecondition>) -> Self {
        Self { errors, failed }
    }

    /// Record a failure under `base`.
    pub fn decline_with(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.errors.add_to_base(message.clone());
        self.failed.push(FailedPrecondition {
            message,
            group: None,
        });
    }

    /// Record a failure under `group`.
    pub fn decline_with_group(&mut self, message: impl Into<String>, group: impl Into<String>) {
        let message = message.into();
        let group = group.into();
        self.errors.add(group.clone(), message.clone());
        self.failed.push(FailedPrecondition {
            message,
            group: Some(group),
        });
    }

    pub fn errors(&self) -> &Errors {
        self.errors
    }

    pub fn declined(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// What preconditions and policies may inspect on an action.
pub trait Subject {
    fn performer(&self) -> Option<&dyn Performer> {
        None
    }

    /// Loosely typed attribute lookup used by built-in checks.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// A single named check over an action.
pub trait Precondition<A>: Send + Sync {
    fn check(&self, action: &A, ctx: &mut PreconditionContext<'_>);
}

struct Inline<F>(F);

impl<A, F> Precondition<A> for Inline<F>
where
    F: Fn(&A, &mut PreconditionContext<'_>) + Send + Sync,
{
    fn check(&self, action: &A, ctx: &mut PreconditionContext<'_>) {
        (self.0)(action, ctx)
    }
}

type Condition<A> = Arc<dyn Fn(&A) -> bool + Send + Sync>;

/// A precondition plus its optional `only_if` / `unless` gates.
pub struct PreconditionEntry<A> {
    check: Arc<dyn Precondition<A>>,
    only_if: Option<Condition<A>>,
    unless: Option<Condition<A>>,
}

impl<A> PreconditionEntry<A> {
    pub fn new<P>(precondition: P) -> Self
    where
        P: Precondition<A> + 'static,
    {
        Self {
            check: Arc::new(precondition),
            only_if: None,
            unless: None,
        }
    }

    pub fn inline<F>(check: F) -> Self
    where
        F: Fn(&A, &mut PreconditionContext<'_>) + Send + Sync + 'static,
        A: 'static,
    {
        Self::new(Inline(check))
    }

    /// Only run when `condition` holds.
    pub fn only_if<F>(mut self, condition: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.only_if = Some(Arc::new(condition));
        self
    }

    /// Skip when `condition` holds.
    pub fn unless<F>(mut self, condition: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.unless = Some(Arc::new(condition));
        self
    }

    fn applies(&self, action: &A) -> bool {
        if let Some(only_if) = &self.only_if {
            if !only_if(action) {
                return false;
            }
        }
        match &self.unless {
            Some(unless) => !unless(action),
            None => true,
        }
    }

    fn run(&self, action: &A, ctx: &mut PreconditionContext<'_>) {
        if self.applies(action) {
            self.check.check(action, ctx);
        }
    }
}

impl<A> Clone for PreconditionEntry<A> {
    fn clone(&self) -> Self {
        Self {
            check: self.check.clone(),
            only_if: self.only_if.clone(),
            unless: self.unless.clone(),
        }
    }
}

/// Ordered preconditions of one action definition.
pub struct PreconditionSet<A> {
    entries: Vec<PreconditionEntry<A>>,
}

impl<A> PreconditionSet<A> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: PreconditionEntry<A>) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every entry in declaration order.
    pub fn run(&self, action: &A, ctx: &mut PreconditionContext<'_>) {
        for entry in &self.entries {
            entry.run(action, ctx);
        }
    }
}

impl<A> Default for PreconditionSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for PreconditionSet<A> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<A> fmt::Debug for PreconditionSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreconditionSet")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<A> Add for PreconditionSet<A> {
    type Output = PreconditionSet<A>;

    fn add(mut self, rhs: PreconditionSet<A>) -> Self::Output {
        self.entries.extend(rhs.entries);
        self
    }
}

/// Declines when the action has no performer.
#[derive(Debug, Clone)]
pub struct PerformerPresent {
    message: String,
}

impl PerformerPresent {
    pub fn new() -> Self {
        Self {
            message: "performer must be present".to_string(),
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for PerformerPresent {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Subject> Precondition<A> for PerformerPresent {
    fn check(&self, action: &A, ctx: &mut PreconditionContext<'_>) {
        if action.performer().is_none() {
            ctx.decline_with(self.message.clone());
        }
    }
}

/// Declines, grouped under the attribute, when an attribute is missing,
/// null, blank or an empty collection.
#[derive(Debug, Clone)]
pub struct AttributePresent {
    attribute: String,
    message: String,
}

impl AttributePresent {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: "must be present".to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

impl<A: Subject> Precondition<A> for AttributePresent {
    fn check(&self, action: &A, ctx: &mut PreconditionContext<'_>) {
        let blank = action.attribute(&self.attribute).map_or(true, |value| is_blank(&value));
        if blank {
            ctx.decline_with_group(self.message.clone(), self.attribute.clone());
        }
    }
}

/// Anything whose preconditions can be evaluated in isolation.
pub trait PreconditionTarget {
    /// Evaluate and return the recorded errors.
    fn check_preconditions(&mut self) -> Errors;
}

impl<B: Action> PreconditionTarget for B {
    fn check_preconditions(&mut self) -> Errors {
        self.satisfy_preconditions();
        self.errors().clone()
    }
}

type TargetBuilder<A> = Arc<dyn Fn(&A) -> Option<Box<dyn PreconditionTarget>> + Send + Sync>;

/// Runs another action's preconditions and imports its `base` errors under
/// `<name>.base`.
pub struct Embedded<A> {
    name: String,
    build: TargetBuilder<A>,
}

impl<A> Embedded<A> {
    pub fn new<B, F>(name: impl Into<String>, build: F) -> Self
    where
        B: Action,
        F: Fn(&A) -> Option<B> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(move |action: &A| {
                build(action).map(|target| Box::new(target) as Box<dyn PreconditionTarget>)
            }),
        }
    }
}

impl<A> Precondition<A> for Embedded<A> {
    fn check(&self, action: &A, ctx: &mut PreconditionContext<'_>) {
        // No target means nothing to check.
        let Some(mut target) = (self.build)(action) else {
            return;
        };
        let errors = target.check_preconditions();
        let group = format!("{}.{}", self.name, BASE);
        for message in errors.base() {
            ctx.decline_with_group(message, group.clone());
        }
    }
}

/// Evaluate every precondition of `action`, replacing any earlier results.
pub(crate) fn satisfy<A: Action>(action: &mut A) -> bool {
    let definition = action.definition();
    let mut errors = Errors::new();
    let mut failed = Vec::new();
    {
        let mut ctx = PreconditionContext::new(&mut errors, &mut failed);
        definition.preconditions().run(action, &mut ctx);
    }

    let satisfied = failed.is_empty();
    let state = action.state_mut();
    state.errors = errors;
    state.failed_preconditions = failed;
    satisfied
}
