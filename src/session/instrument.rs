//! Action events for external observability tooling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::action::EntryPoint;

/// Name of the event emitted around every perform call.
pub const PERFORM_EVENT: &str = "perform_action";

/// How an instrumented perform call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventOutcome {
    Performed,
    Invalid,
    Declined,
    RolledBack,
    Failed { kind: &'static str, message: String },
}

/// One perform call, as seen by subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ActionEvent {
    pub name: &'static str,
    pub action: String,
    pub using: EntryPoint,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: EventOutcome,
}

impl ActionEvent {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Subscriber callback.
pub type Subscriber = Arc<dyn Fn(&ActionEvent) + Send + Sync>;

/// Handle returned by [`Instrumentation::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered event subscribers, shared by every session of an engine.
#[derive(Default)]
pub struct Instrumentation {
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&ActionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(subscriber)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `event` to every subscriber.
    ///
    /// The list is cloned first so subscribers may subscribe or unsubscribe.
    pub fn publish(&self, event: &ActionEvent) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, subscriber)| subscriber.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(event);
        }
    }
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
