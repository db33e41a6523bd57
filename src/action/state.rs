use std::cell::OnceCell;

use crate::action::precondition::FailedPrecondition;
use crate::validation::Errors;

/// Per-instance pipeline state.
///
/// `allowed` is memoized for the life of the instance; `performable` until
/// preconditions are evaluated again.
#[derive(Debug, Clone, Default)]
pub struct ActionState {
    pub(crate) errors: Errors,
    pub(crate) failed_preconditions: Vec<FailedPrecondition>,
    pub(crate) allowed: OnceCell<bool>,
    pub(crate) performable: OnceCell<bool>,
    pub(crate) performed: bool,
}

impl ActionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }

    pub fn failed_preconditions(&self) -> &[FailedPrecondition] {
        &self.failed_preconditions
    }

    pub fn performed(&self) -> bool {
        self.performed
    }
}
