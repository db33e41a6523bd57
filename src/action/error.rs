//! Action error types.

use thiserror::Error;

use crate::storage::StorageError;
use crate::transaction::TransactionError;
use crate::validation::{AttributeError, ValidationError};

/// Boxed error raised by business code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for action operations.
pub type ActionResult<T> = Result<T, ActionError>;

/// Errors surfaced by the action pipeline.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The policy gate rejected the performer.
    #[error("{action} action is not allowed for {performer}")]
    NotAllowed { action: String, performer: String },

    /// The action was invalid, or a handled error aborted a strict perform.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The action definition has no perform body.
    #[error("{action} does not define a perform body")]
    NotImplemented { action: String },

    /// Error raised by business code.
    #[error("{0}")]
    Business(#[source] BoxError),

    /// Attribute assignment failed.
    #[error("attribute error: {0}")]
    Attributes(#[from] AttributeError),

    /// Transaction stack or durable backend failure.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Abort the current transaction frame only.
    #[error("transaction frame rolled back")]
    Rollback,
}

impl ActionError {
    /// Wrap a business error.
    pub fn business(err: impl Into<BoxError>) -> Self {
        ActionError::Business(err.into())
    }

    /// Check if this is the frame-local rollback sentinel.
    pub fn is_rollback(&self) -> bool {
        matches!(self, ActionError::Rollback)
    }

    /// Check if the policy gate rejected the performer.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ActionError::NotAllowed { .. })
    }

    /// Check if retrying the whole action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Transaction(t) if t.is_retryable())
    }

    /// Short, stable name of the error kind for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::NotAllowed { .. } => "forbidden",
            ActionError::Validation(_) => "validation_failed",
            ActionError::NotImplemented { .. } => "not_implemented",
            ActionError::Business(_) => "business",
            ActionError::Attributes(_) => "attributes",
            ActionError::Transaction(_) => "transaction",
            ActionError::Rollback => "rollback",
        }
    }

    /// The error handlers are matched against: the business error itself for
    /// `Business`, otherwise this error.
    pub(crate) fn raised(&self) -> &(dyn std::error::Error + 'static) {
        let raised: &(dyn std::error::Error + 'static) = match self {
            ActionError::Business(err) => &**err,
            other => other,
        };
        raised
    }

    /// Convert into a boxed error suitable as a `source`, unwrapping
    /// business errors.
    pub(crate) fn into_source(self) -> BoxError {
        match self {
            ActionError::Business(err) => err,
            other => Box::new(other),
        }
    }
}

impl From<StorageError> for ActionError {
    fn from(err: StorageError) -> Self {
        ActionError::Transaction(TransactionError::Storage(err))
    }
}
