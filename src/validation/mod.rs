//! Validation and attribute contracts consumed by the action pipeline.
//!
//! Preconditions and validators write into the same [`Errors`] sink. Strict
//! entry points turn a non-empty sink into a [`ValidationError`].

mod attributes;
mod error;
mod errors;

pub use attributes::{merge_attributes, AssignAttributes, AttributeError, AttributeResult};
pub use error::ValidationError;
pub use errors::{ErrorEntry, Errors, BASE};
