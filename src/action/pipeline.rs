//! The perform state machine shared by every entry point.
//!
//! ```text
//!   Pending ──authorize──▶ Authorized ──valid──▶ Validated ──body──▶ Performed
//!      │                      │                      │                │
//!      ▼                      ▼                      ▼                ▼
//!  NotImplemented          Forbidden          Invalid / Declined   RolledBack
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info_span, warn};

use crate::action::definition::{ActionDefinition, Body};
use crate::action::error::{ActionError, ActionResult};
use crate::action::Action;
use crate::session::{ActionEvent, EventOutcome, Session, PERFORM_EVENT};
use crate::transaction::{run_all, CommitCallback, CommitListener, Outcome};
use crate::validation::ValidationError;

/// Which caller-facing method started the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryPoint {
    #[serde(rename = "perform")]
    Perform,
    #[serde(rename = "perform!")]
    PerformStrict,
    #[serde(rename = "try_perform!")]
    TryPerform,
}

impl EntryPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Perform => "perform",
            EntryPoint::PerformStrict => "perform!",
            EntryPoint::TryPerform => "try_perform!",
        }
    }

    /// Strict entry points raise `ValidationError` instead of returning.
    pub fn is_strict(&self) -> bool {
        !matches!(self, EntryPoint::Perform)
    }
}

/// Validation context and free-form options for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformOptions {
    context: Option<String>,
    options: Map<String, Value>,
}

impl PerformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run validators restricted to `context` as well as unrestricted ones.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn validation_context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }
}

/// How a single run ended, before it is mapped onto an entry point's return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Performance<T> {
    Performed(T),
    /// Validation failed on the lenient path.
    Invalid,
    /// Preconditions failed before `try_perform` opened a frame.
    Declined,
    /// The frame was aborted: a handled error, an explicit rollback, or an
    /// around hook that skipped the body.
    RolledBack,
}

impl<T> Performance<T> {
    pub fn into_output(self) -> Option<T> {
        match self {
            Performance::Performed(output) => Some(output),
            _ => None,
        }
    }

    fn event_outcome(&self) -> EventOutcome {
        match self {
            Performance::Performed(_) => EventOutcome::Performed,
            Performance::Invalid => EventOutcome::Invalid,
            Performance::Declined => EventOutcome::Declined,
            Performance::RolledBack => EventOutcome::RolledBack,
        }
    }
}

/// Commit callbacks prepared by one action run.
///
/// Registered when the action's frame opens, filled once the body succeeds.
struct ActionCommit {
    action: String,
    callbacks: Rc<RefCell<Vec<CommitCallback>>>,
}

impl CommitListener for ActionCommit {
    fn run_commit_callbacks(self: Box<Self>) -> ActionResult<()> {
        let callbacks = self.callbacks.take();
        debug!(action = %self.action, count = callbacks.len(), "running action commit hooks");
        run_all(callbacks)
    }
}

/// Run `action` through the pipeline for `entry`.
pub(crate) fn run<A: Action>(
    action: &mut A,
    session: &Session,
    entry: EntryPoint,
    options: &PerformOptions,
) -> ActionResult<Performance<A::Output>> {
    let definition = action.definition();
    let Some(body) = definition.body().cloned() else {
        return Err(ActionError::NotImplemented {
            action: definition.name().to_string(),
        });
    };

    instrument(session, definition.name(), entry, || {
        execute(action, session, &definition, &body, entry, options)
    })
}

fn execute<A: Action>(
    action: &mut A,
    session: &Session,
    definition: &ActionDefinition<A>,
    body: &Body<A>,
    entry: EntryPoint,
    options: &PerformOptions,
) -> ActionResult<Performance<A::Output>> {
    action.authorize()?;

    if entry == EntryPoint::TryPerform && !action.satisfy_preconditions() {
        debug!(action = definition.name(), "preconditions declined");
        return Ok(Performance::Declined);
    }

    let outcome = session.transaction(|| {
        let slot = register_commit_hooks(session, definition)?;

        if !action.valid(options.validation_context()) {
            if entry.is_strict() {
                return Err(invalid(definition, action, None));
            }
            return Ok(Performance::Invalid);
        }

        perform_action(action, session, definition, body, entry, options, slot)
    })?;

    match outcome {
        Outcome::Committed(performance) => Ok(performance),
        Outcome::Aborted if entry.is_strict() => Err(invalid(definition, action, None)),
        Outcome::Aborted => Ok(Performance::RolledBack),
    }
}

fn register_commit_hooks<A: Action>(
    session: &Session,
    definition: &ActionDefinition<A>,
) -> ActionResult<Option<Rc<RefCell<Vec<CommitCallback>>>>> {
    if definition.commit_hooks().is_empty() {
        return Ok(None);
    }
    let callbacks = Rc::new(RefCell::new(Vec::new()));
    session.after_commit_listener(ActionCommit {
        action: definition.name().to_string(),
        callbacks: callbacks.clone(),
    })?;
    Ok(Some(callbacks))
}

fn perform_action<A: Action>(
    action: &mut A,
    session: &Session,
    definition: &ActionDefinition<A>,
    body: &Body<A>,
    entry: EntryPoint,
    options: &PerformOptions,
    slot: Option<Rc<RefCell<Vec<CommitCallback>>>>,
) -> ActionResult<Performance<A::Output>> {
    let mut output = None;
    let result = definition.lifecycle().run(action, session, &mut |action: &mut A| {
        action.apply_association_changes()?;
        output = Some(body(action, session, options)?);
        Ok(())
    });

    match result {
        Ok(()) => {
            let Some(output) = output else {
                debug!(action = definition.name(), "body skipped by around hook");
                return Err(ActionError::Rollback);
            };
            action.state_mut().performed = true;
            if let Some(slot) = slot {
                let prepared = definition
                    .commit_hooks()
                    .iter()
                    .map(|prepare| prepare(&*action))
                    .collect::<Vec<_>>();
                slot.borrow_mut().extend(prepared);
            }
            Ok(Performance::Performed(output))
        }
        Err(err) if err.is_rollback() => Err(err),
        Err(err) => {
            if !definition.handlers().invoke(action, &err) {
                return Err(err);
            }
            debug!(
                action = definition.name(),
                error_kind = err.kind(),
                error = %err,
                "handled error, aborting frame"
            );
            if entry.is_strict() {
                Err(invalid(definition, action, Some(err)))
            } else {
                Err(ActionError::Rollback)
            }
        }
    }
}

fn invalid<A: Action>(
    definition: &ActionDefinition<A>,
    action: &A,
    cause: Option<ActionError>,
) -> ActionError {
    let error = ValidationError::new(definition.name(), action.errors().clone());
    match cause {
        Some(cause) => error.with_source(cause.into_source()).into(),
        None => error.into(),
    }
}

fn instrument<T, F>(
    session: &Session,
    action: &str,
    entry: EntryPoint,
    f: F,
) -> ActionResult<Performance<T>>
where
    F: FnOnce() -> ActionResult<Performance<T>>,
{
    if !session.engine().config().instrument {
        return f();
    }

    let span = info_span!(
        "perform_action",
        action = action,
        using = entry.as_str(),
        depth = session.depth()
    );
    let _enter = span.enter();

    let started_at = Utc::now();
    let result = f();
    let finished_at = Utc::now();

    let outcome = match &result {
        Ok(performance) => performance.event_outcome(),
        Err(err) => {
            if !err.is_forbidden() {
                warn!(error_kind = err.kind(), error = %err, "action failed");
            }
            EventOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            }
        }
    };
    debug!(outcome = ?outcome, "action finished");

    session.engine().instrumentation().publish(&ActionEvent {
        name: PERFORM_EVENT,
        action: action.to_string(),
        using: entry,
        started_at,
        finished_at,
        outcome,
    });

    result
}
