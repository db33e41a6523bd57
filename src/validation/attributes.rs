//! Attribute assignment contract.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Result type for attribute assignment.
pub type AttributeResult<T> = Result<T, AttributeError>;

/// Errors raised while assigning attributes.
#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("unknown attribute: {0}")]
    Unknown(String),

    #[error("attributes must serialize to a JSON object")]
    NotAnObject,

    #[error("attribute serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Mass assignment of attributes from loosely typed input.
pub trait AssignAttributes {
    fn assign_attributes(&mut self, attributes: &Map<String, Value>) -> AttributeResult<()>;
}

/// Assign `attributes` onto a serde-backed attribute struct.
///
/// Unknown keys are rejected and nothing is assigned; values are coerced by
/// the target's `Deserialize` impl.
pub fn merge_attributes<T>(target: &mut T, attributes: &Map<String, Value>) -> AttributeResult<()>
where
    T: Serialize + DeserializeOwned,
{
    let mut current = serde_json::to_value(&*target)?;
    let fields = current.as_object_mut().ok_or(AttributeError::NotAnObject)?;

    for key in attributes.keys() {
        if !fields.contains_key(key) {
            return Err(AttributeError::Unknown(key.clone()));
        }
    }
    for (key, value) in attributes {
        fields.insert(key.clone(), value.clone());
    }

    *target = serde_json::from_value(current)?;
    Ok(())
}
