//! core type-safe wrappers for durable transaction handles.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier of one durable transaction or savepoint.
///
/// Generated as a lowercase ULID so ids sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    /// The string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form of the id for log lines.
    pub fn short(&self) -> &str {
        let start = self.0.len().saturating_sub(8);
        &self.0[start..]
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TxId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Handle to an open durable transaction.
///
/// A handle without a parent is a root transaction and owns the durable
/// commit. A handle with a parent is a savepoint nested inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHandle {
    id: TxId,
    parent: Option<TxId>,
    depth: usize,
    started_at: DateTime<Utc>,
}

impl TxHandle {
    /// Open a root handle.
    pub fn root() -> Self {
        Self {
            id: TxId::generate(),
            parent: None,
            depth: 1,
            started_at: Utc::now(),
        }
    }

    /// Open a savepoint handle nested inside `parent`.
    pub fn nested(parent: &TxHandle) -> Self {
        Self {
            id: TxId::generate(),
            parent: Some(parent.id.clone()),
            depth: parent.depth + 1,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &TxId {
        &self.id
    }

    pub fn parent(&self) -> Option<&TxId> {
        self.parent.as_ref()
    }

    /// Nesting level, 1 for a root transaction.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_id_is_lowercase_ulid() {
        let id = TxId::generate();
        assert_eq!(id.as_str().len(), 26);
        assert_eq!(id.as_str(), id.as_str().to_lowercase());
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_nested_handle_tracks_parent() {
        let root = TxHandle::root();
        let child = TxHandle::nested(&root);
        let grandchild = TxHandle::nested(&child);

        assert!(root.is_root());
        assert_eq!(child.parent(), Some(root.id()));
        assert_eq!(grandchild.depth(), 3);
        assert_ne!(child.id(), grandchild.id());
    }
}
