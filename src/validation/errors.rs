//! Ordered attribute → message multimap shared by preconditions and validators.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::Value;

/// Key for errors that belong to the action as a whole.
pub const BASE: &str = "base";

/// One recorded error.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct ErrorEntry {
    pub attribute: String,
    pub message: String,
}

/// Errors collected on an action, in insertion order.
///
/// Serializes as a JSON object mapping each attribute to its messages, with
/// attributes in the order they first received an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errors {
    entries: Vec<ErrorEntry>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` under `attribute`.
    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.entries.push(ErrorEntry {
            attribute: attribute.into(),
            message: message.into(),
        });
    }

    /// Record `message` under [`BASE`].
    pub fn add_to_base(&mut self, message: impl Into<String>) {
        self.add(BASE, message);
    }

    /// Messages recorded under `attribute`.
    pub fn get(&self, attribute: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.attribute == attribute)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn base(&self) -> Vec<&str> {
        self.get(BASE)
    }

    /// Check if any message is recorded under `attribute`.
    pub fn include(&self, attribute: &str) -> bool {
        self.entries.iter().any(|e| e.attribute == attribute)
    }

    /// Attributes with errors, in first-seen order.
    pub fn attributes(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.attribute.as_str()) {
                seen.push(entry.attribute.as_str());
            }
        }
        seen
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append every entry of `other`.
    pub fn merge(&mut self, other: &Errors) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Append every entry of `other` with its attribute prefixed by `namespace`.
    pub fn merge_namespaced(&mut self, namespace: &str, other: &Errors) {
        for entry in &other.entries {
            self.add(format!("{}.{}", namespace, entry.attribute), entry.message.clone());
        }
    }

    /// Human readable messages, base errors verbatim and attribute errors
    /// prefixed with the humanized attribute name.
    pub fn full_messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| full_message(&e.attribute, &e.message))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Errors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let attributes = self.attributes();
        let mut map = serializer.serialize_map(Some(attributes.len()))?;
        for attribute in attributes {
            map.serialize_entry(attribute, &self.get(attribute))?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a ErrorEntry;
    type IntoIter = std::slice::Iter<'a, ErrorEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn full_message(attribute: &str, message: &str) -> String {
    if attribute == BASE {
        return message.to_string();
    }
    format!("{} {}", humanize(attribute), message)
}

/// `published_at` → `Published at`, `author.base` → `Author base`.
fn humanize(attribute: &str) -> String {
    let words = attribute.replace(['_', '.'], " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_and_get() {
        let mut errors = Errors::new();
        errors.add("title", "can't be blank");
        errors.add_to_base("post is locked");
        errors.add("title", "is too short");

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("title"), vec!["can't be blank", "is too short"]);
        assert_eq!(errors.base(), vec!["post is locked"]);
        assert_eq!(errors.attributes(), vec!["title", "base"]);
        assert!(errors.include("title"));
        assert!(!errors.include("body"));
    }

    #[test]
    fn test_full_messages() {
        let mut errors = Errors::new();
        errors.add("published_at", "must be in the past");
        errors.add_to_base("post is locked");

        assert_eq!(
            errors.full_messages(),
            vec!["Published at must be in the past", "post is locked"]
        );
    }

    #[test]
    fn test_merge_namespaced() {
        let mut inner = Errors::new();
        inner.add_to_base("author is banned");

        let mut outer = Errors::new();
        outer.merge_namespaced("author", &inner);

        assert_eq!(outer.get("author.base"), vec!["author is banned"]);
        assert_eq!(outer.full_messages(), vec!["Author base author is banned"]);
    }

    #[test]
    fn test_serialize_grouped_by_attribute() {
        let mut errors = Errors::new();
        errors.add("title", "can't be blank");
        errors.add_to_base("post is locked");
        errors.add("title", "is too short");

        assert_eq!(
            errors.to_json(),
            json!({"title": ["can't be blank", "is too short"], "base": ["post is locked"]})
        );
    }
}
