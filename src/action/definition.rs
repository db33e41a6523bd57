//! Per-type action declarations.
//!
//! An [`ActionDefinition`] is built once per action type and shared through an
//! `Arc`. Every list keeps declaration order. `extend` starts a new builder
//! from an existing definition, so derived actions inherit and append.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::action::error::ActionResult;
use crate::action::handlers::HandlerRegistry;
use crate::action::lifecycle::Lifecycle;
use crate::action::pipeline::PerformOptions;
use crate::action::policy::{PolicyGate, PolicyStrategy};
use crate::action::precondition::{
    Embedded, Precondition, PreconditionContext, PreconditionEntry, PreconditionSet,
};
use crate::action::Action;
use crate::session::Session;
use crate::transaction::CommitCallback;
use crate::validation::Errors;

/// The perform body.
pub type Body<A> =
    Arc<dyn Fn(&mut A, &Session, &PerformOptions) -> ActionResult<<A as Action>::Output> + Send + Sync>;

/// Builds the callback that runs once the outermost transaction commits.
pub type CommitHook<A> = Arc<dyn Fn(&A) -> CommitCallback + Send + Sync>;

type ValidatorFn<A> = Arc<dyn Fn(&A, &mut Errors) + Send + Sync>;

/// A validator, optionally restricted to one validation context.
pub struct Validator<A> {
    on: Option<String>,
    check: ValidatorFn<A>,
}

impl<A> Validator<A> {
    /// Check if this validator runs in `context`. Unrestricted validators run
    /// in every context.
    pub fn applies_in(&self, context: Option<&str>) -> bool {
        match &self.on {
            None => true,
            Some(on) => context == Some(on.as_str()),
        }
    }

    pub fn run(&self, action: &A, errors: &mut Errors) {
        (self.check)(action, errors)
    }
}

impl<A> Clone for Validator<A> {
    fn clone(&self) -> Self {
        Self {
            on: self.on.clone(),
            check: self.check.clone(),
        }
    }
}

pub struct ActionDefinition<A: Action> {
    name: String,
    policies: PolicyGate<A>,
    preconditions: PreconditionSet<A>,
    validators: Vec<Validator<A>>,
    handlers: HandlerRegistry<A>,
    lifecycle: Lifecycle<A>,
    commit_hooks: Vec<CommitHook<A>>,
    body: Option<Body<A>>,
}

impl<A: Action> ActionDefinition<A> {
    pub fn builder(name: impl Into<String>) -> ActionDefinitionBuilder<A> {
        ActionDefinitionBuilder {
            definition: ActionDefinition {
                name: name.into(),
                policies: PolicyGate::new(),
                preconditions: PreconditionSet::new(),
                validators: Vec::new(),
                handlers: HandlerRegistry::new(),
                lifecycle: Lifecycle::new(),
                commit_hooks: Vec::new(),
                body: None,
            },
        }
    }

    /// Start a derived definition that inherits everything declared here.
    pub fn extend(&self, name: impl Into<String>) -> ActionDefinitionBuilder<A> {
        ActionDefinitionBuilder {
            definition: ActionDefinition {
                name: name.into(),
                policies: self.policies.clone(),
                preconditions: self.preconditions.clone(),
                validators: self.validators.clone(),
                handlers: self.handlers.clone(),
                lifecycle: self.lifecycle.clone(),
                commit_hooks: self.commit_hooks.clone(),
                body: self.body.clone(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policies(&self) -> &PolicyGate<A> {
        &self.policies
    }

    pub fn preconditions(&self) -> &PreconditionSet<A> {
        &self.preconditions
    }

    pub fn validators(&self) -> &[Validator<A>] {
        &self.validators
    }

    pub fn handlers(&self) -> &HandlerRegistry<A> {
        &self.handlers
    }

    pub fn lifecycle(&self) -> &Lifecycle<A> {
        &self.lifecycle
    }

    pub fn commit_hooks(&self) -> &[CommitHook<A>] {
        &self.commit_hooks
    }

    pub fn body(&self) -> Option<&Body<A>> {
        self.body.as_ref()
    }
}

impl<A: Action> fmt::Debug for ActionDefinition<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("policies", &self.policies.len())
            .field("preconditions", &self.preconditions.len())
            .field("validators", &self.validators.len())
            .field("handlers", &self.handlers)
            .field("lifecycle", &self.lifecycle)
            .field("commit_hooks", &self.commit_hooks.len())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Declarative builder for [`ActionDefinition`].
pub struct ActionDefinitionBuilder<A: Action> {
    definition: ActionDefinition<A>,
}

impl<A: Action> ActionDefinitionBuilder<A> {
    pub fn allow_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.definition.policies.allow_if(predicate);
        self
    }

    pub fn policy_strategy<S>(mut self, strategy: S) -> Self
    where
        S: PolicyStrategy<A> + 'static,
    {
        self.definition.policies.set_strategy(strategy);
        self
    }

    pub fn precondition<F>(self, check: F) -> Self
    where
        F: Fn(&A, &mut PreconditionContext<'_>) + Send + Sync + 'static,
    {
        self.precondition_entry(PreconditionEntry::inline(check))
    }

    /// Add a precondition with `only_if` / `unless` gates.
    pub fn precondition_entry(mut self, entry: PreconditionEntry<A>) -> Self {
        self.definition.preconditions.push(entry);
        self
    }

    pub fn precondition_object<P>(self, precondition: P) -> Self
    where
        P: Precondition<A> + 'static,
    {
        self.precondition_entry(PreconditionEntry::new(precondition))
    }

    /// Embed another action's preconditions; its `base` errors land under
    /// `<name>.base`.
    pub fn embed<B, F>(self, name: impl Into<String>, build: F) -> Self
    where
        B: Action,
        F: Fn(&A) -> Option<B> + Send + Sync + 'static,
    {
        self.precondition_object(Embedded::new(name, build))
    }

    /// Append a whole set, e.g. one shared between action types.
    pub fn preconditions(mut self, set: PreconditionSet<A>) -> Self {
        let current = std::mem::take(&mut self.definition.preconditions);
        self.definition.preconditions = current + set;
        self
    }

    pub fn validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&A, &mut Errors) + Send + Sync + 'static,
    {
        self.definition.validators.push(Validator {
            on: None,
            check: Arc::new(check),
        });
        self
    }

    /// Validator that only runs in the named validation context.
    pub fn validate_on<F>(mut self, context: impl Into<String>, check: F) -> Self
    where
        F: Fn(&A, &mut Errors) + Send + Sync + 'static,
    {
        self.definition.validators.push(Validator {
            on: Some(context.into()),
            check: Arc::new(check),
        });
        self
    }

    pub fn handle<E, F>(mut self, handler: F) -> Self
    where
        E: Error + 'static,
        F: Fn(&mut A, &E) + Send + Sync + 'static,
    {
        self.definition.handlers.handle::<E, F>(handler);
        self
    }

    pub fn handle_if<M, F>(mut self, label: impl Into<String>, matcher: M, handler: F) -> Self
    where
        M: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
        F: Fn(&mut A, &(dyn Error + 'static)) + Send + Sync + 'static,
    {
        self.definition.handlers.handle_if(label, matcher, handler);
        self
    }

    pub fn before_execute<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut A, &Session) -> ActionResult<()> + Send + Sync + 'static,
    {
        self.definition.lifecycle.before(hook);
        self
    }

    pub fn around_execute<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut A, &mut dyn FnMut(&mut A) -> ActionResult<()>) -> ActionResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.definition.lifecycle.around(hook);
        self
    }

    pub fn after_execute<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut A, &Session) -> ActionResult<()> + Send + Sync + 'static,
    {
        self.definition.lifecycle.after(hook);
        self
    }

    /// Register work to run after the outermost transaction commits.
    ///
    /// `prepare` runs right after a successful perform, with the action in
    /// its final state; the closure it returns runs at commit.
    pub fn after_commit<F>(mut self, prepare: F) -> Self
    where
        F: Fn(&A) -> CommitCallback + Send + Sync + 'static,
    {
        self.definition.commit_hooks.push(Arc::new(prepare));
        self
    }

    /// Set the perform body, replacing an inherited one.
    pub fn perform<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut A, &Session, &PerformOptions) -> ActionResult<A::Output> + Send + Sync + 'static,
    {
        self.definition.body = Some(Arc::new(body));
        self
    }

    pub fn build(self) -> Arc<ActionDefinition<A>> {
        Arc::new(self.definition)
    }
}
