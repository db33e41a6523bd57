//! Actions: authorized, precondition-checked, transactional units of work.
//!
//! An action type implements [`Action`] by pointing at its shared
//! [`ActionDefinition`] and at a per-instance [`ActionState`]. Everything
//! else (the policy gate, preconditions, validation, handlers, hooks and the
//! perform entry points) is provided.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          perform / perform_strict / try_perform             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌──────────────┬──────┴───────┬──────────────┐
//!        ▼              ▼              ▼              ▼
//!  ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐
//!  │  Policy   │  │Precondition│  │  Handler  │  │ Lifecycle │
//!  │   Gate    │  │    Set     │  │ Registry  │  │   Hooks   │
//!  └───────────┘  └────────────┘  └───────────┘  └───────────┘
//!                              │
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │ TransactionManager  │
//!                   │ (Session's frames)  │
//!                   └─────────────────────┘
//! ```

mod definition;
mod error;
mod handlers;
mod lifecycle;
mod pipeline;
mod policy;
mod precondition;
mod state;

use std::cell::OnceCell;
use std::sync::Arc;

use tracing::debug;

pub use definition::{ActionDefinition, ActionDefinitionBuilder, Body, CommitHook, Validator};
pub use error::{ActionError, ActionResult, BoxError};
pub use handlers::{HandlerRegistry, Resolved};
pub use lifecycle::{Around, Hook, Lifecycle};
pub use pipeline::{EntryPoint, PerformOptions, Performance};
pub use policy::{AllPolicies, AnyPolicy, Performer, Policy, PolicyGate, PolicyStrategy};
pub use precondition::{
    AttributePresent, Embedded, FailedPrecondition, PerformerPresent, Precondition,
    PreconditionContext, PreconditionEntry, PreconditionSet, PreconditionTarget, Subject,
};
pub use state::ActionState;

use crate::session::Session;
use crate::validation::{Errors, ValidationError};

/// A business operation run through the perform pipeline.
pub trait Action: Subject + Sized + 'static {
    /// What a successful body returns.
    type Output;

    fn definition(&self) -> Arc<ActionDefinition<Self>>;

    fn state(&self) -> &ActionState;

    fn state_mut(&mut self) -> &mut ActionState;

    /// Persist pending association changes. Runs inside the action's frame,
    /// right before the body.
    fn apply_association_changes(&mut self) -> ActionResult<()> {
        Ok(())
    }

    fn errors(&self) -> &Errors {
        self.state().errors()
    }

    fn errors_mut(&mut self) -> &mut Errors {
        self.state_mut().errors_mut()
    }

    fn failed_preconditions(&self) -> &[FailedPrecondition] {
        self.state().failed_preconditions()
    }

    /// True once the body has run successfully.
    fn performed(&self) -> bool {
        self.state().performed()
    }

    /// Evaluate the policy gate. Memoized for the life of the instance.
    fn allowed(&self) -> bool {
        *self
            .state()
            .allowed
            .get_or_init(|| self.definition().policies().evaluate(self))
    }

    /// Fail with [`ActionError::NotAllowed`] unless the gate allows.
    fn authorize(&self) -> ActionResult<&Self> {
        if self.allowed() {
            return Ok(self);
        }
        let performer = policy::performer_label(self.performer());
        let action = self.definition().name().to_string();
        debug!(action = %action, performer = %performer, "action not allowed");
        Err(ActionError::NotAllowed { action, performer })
    }

    /// Clear errors and failed preconditions, then run every precondition.
    fn satisfy_preconditions(&mut self) -> bool {
        let satisfied = precondition::satisfy(self);
        self.state_mut().performable = OnceCell::from(satisfied);
        satisfied
    }

    /// Whether preconditions hold, evaluating them only if they have not
    /// been evaluated yet.
    fn performable(&mut self) -> bool {
        if let Some(performable) = self.state().performable.get() {
            return *performable;
        }
        self.satisfy_preconditions()
    }

    /// Record a precondition failure under `base`.
    fn decline_with(&mut self, message: impl Into<String>) {
        let state = self.state_mut();
        PreconditionContext::new(&mut state.errors, &mut state.failed_preconditions)
            .decline_with(message);
    }

    /// Record a precondition failure under `group`.
    fn decline_with_group(&mut self, message: impl Into<String>, group: impl Into<String>) {
        let state = self.state_mut();
        PreconditionContext::new(&mut state.errors, &mut state.failed_preconditions)
            .decline_with_group(message, group);
    }

    /// Run preconditions, then (only if they all held) the validators that
    /// apply in `context`.
    fn valid(&mut self, context: Option<&str>) -> bool {
        if !self.satisfy_preconditions() {
            return false;
        }

        let definition = self.definition();
        let mut errors = std::mem::take(self.errors_mut());
        for validator in definition.validators() {
            if validator.applies_in(context) {
                validator.run(self, &mut errors);
            }
        }

        let valid = errors.is_empty();
        *self.errors_mut() = errors;
        valid
    }

    fn validate_strict(&mut self, context: Option<&str>) -> ActionResult<()> {
        if self.valid(context) {
            return Ok(());
        }
        Err(ValidationError::new(self.definition().name(), self.errors().clone()).into())
    }

    /// Returns `Ok(None)` when invalid or when a handled error rolled the
    /// action back.
    fn perform(&mut self, session: &Session) -> ActionResult<Option<Self::Output>> {
        self.perform_with(session, &PerformOptions::default())
    }

    fn perform_with(
        &mut self,
        session: &Session,
        options: &PerformOptions,
    ) -> ActionResult<Option<Self::Output>> {
        pipeline::run(self, session, EntryPoint::Perform, options).map(Performance::into_output)
    }

    /// Like [`perform`](Action::perform), but invalid or rolled back runs fail
    /// with [`ActionError::Validation`].
    fn perform_strict(&mut self, session: &Session) -> ActionResult<Self::Output> {
        self.perform_strict_with(session, &PerformOptions::default())
    }

    fn perform_strict_with(
        &mut self,
        session: &Session,
        options: &PerformOptions,
    ) -> ActionResult<Self::Output> {
        match pipeline::run(self, session, EntryPoint::PerformStrict, options)? {
            Performance::Performed(output) => Ok(output),
            _ => Err(ValidationError::new(self.definition().name(), self.errors().clone()).into()),
        }
    }

    /// Returns `Ok(None)` without validating or running the body when
    /// preconditions fail; otherwise behaves like
    /// [`perform_strict`](Action::perform_strict).
    fn try_perform(&mut self, session: &Session) -> ActionResult<Option<Self::Output>> {
        self.try_perform_with(session, &PerformOptions::default())
    }

    fn try_perform_with(
        &mut self,
        session: &Session,
        options: &PerformOptions,
    ) -> ActionResult<Option<Self::Output>> {
        match pipeline::run(self, session, EntryPoint::TryPerform, options)? {
            Performance::Performed(output) => Ok(Some(output)),
            Performance::Declined => Ok(None),
            _ => Err(ValidationError::new(self.definition().name(), self.errors().clone()).into()),
        }
    }
}
