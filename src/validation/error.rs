//! The aggregated validation failure raised by strict entry points.

use serde_json::{json, Value};
use thiserror::Error;

use crate::action::BoxError;
use crate::validation::errors::Errors;

/// An action was invalid, or a handled error aborted its body.
///
/// Carries the action name and a snapshot of its errors. When raised for a
/// handled error, the underlying error is available through `source()`.
#[derive(Debug, Error)]
#[error("Validation failed: {message}")]
pub struct ValidationError {
    action: String,
    errors: Errors,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ValidationError {
    pub fn new(action: impl Into<String>, errors: Errors) -> Self {
        let message = match errors.full_messages() {
            messages if messages.is_empty() => "no errors recorded".to_string(),
            messages => messages.join(", "),
        };
        Self {
            action: action.into(),
            errors,
            message,
            source: None,
        }
    }

    /// Attach the error that caused this failure.
    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }

    /// Name of the action that failed.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    /// Joined human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured form suitable for an API response body.
    pub fn to_json(&self) -> Value {
        json!({
            "action": self.action,
            "message": self.message,
            "errors": self.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_message_joins_full_messages() {
        let mut errors = Errors::new();
        errors.add("title", "can't be blank");
        errors.add_to_base("post is locked");

        let err = ValidationError::new("PublishPost", errors);
        assert_eq!(
            err.to_string(),
            "Validation failed: Title can't be blank, post is locked"
        );
        assert_eq!(err.action(), "PublishPost");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_source_and_json() {
        let mut errors = Errors::new();
        errors.add_to_base("quota exceeded");

        let err = ValidationError::new("Upload", errors).with_source("disk full".into());
        assert_eq!(err.source().unwrap().to_string(), "disk full");
        assert_eq!(
            err.to_json(),
            json!({
                "action": "Upload",
                "message": "quota exceeded",
                "errors": {"base": ["quota exceeded"]},
            })
        );
    }
}
