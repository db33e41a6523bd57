//! Policy gate: decides whether the performer may run an action.

use std::fmt;
use std::sync::Arc;

/// A boolean predicate over the action.
pub type Policy<A> = Arc<dyn Fn(&A) -> bool + Send + Sync>;

/// The actor on whose behalf an action runs.
pub trait Performer {
    /// Kind of actor, e.g. `Teacher`.
    fn kind(&self) -> &str;

    /// Identifier of the actor.
    fn id(&self) -> String;
}

/// Combines the declared policies into one decision.
///
/// This is the extension point of the gate: swap the strategy to replace the
/// default "any policy allows" rule.
pub trait PolicyStrategy<A>: Send + Sync {
    fn allowed(&self, action: &A, policies: &[Policy<A>]) -> bool;
}

/// Allowed when at least one policy allows. No policies means not allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyPolicy;

impl<A> PolicyStrategy<A> for AnyPolicy {
    fn allowed(&self, action: &A, policies: &[Policy<A>]) -> bool {
        policies.iter().any(|policy| policy(action))
    }
}

/// Allowed when there is at least one policy and every policy allows.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllPolicies;

impl<A> PolicyStrategy<A> for AllPolicies {
    fn allowed(&self, action: &A, policies: &[Policy<A>]) -> bool {
        !policies.is_empty() && policies.iter().all(|policy| policy(action))
    }
}

/// Declared policies plus the strategy that combines them.
pub struct PolicyGate<A> {
    policies: Vec<Policy<A>>,
    strategy: Arc<dyn PolicyStrategy<A>>,
}

impl<A> PolicyGate<A> {
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            strategy: Arc::new(AnyPolicy),
        }
    }

    pub fn allow_if<F>(&mut self, predicate: F)
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.policies.push(Arc::new(predicate));
    }

    pub fn set_strategy<S>(&mut self, strategy: S)
    where
        S: PolicyStrategy<A> + 'static,
    {
        self.strategy = Arc::new(strategy);
    }

    /// Evaluate the policies. Callers memoize the answer per instance.
    pub fn evaluate(&self, action: &A) -> bool {
        self.strategy.allowed(action, &self.policies)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl<A> Default for PolicyGate<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for PolicyGate<A> {
    fn clone(&self) -> Self {
        Self {
            policies: self.policies.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<A> fmt::Debug for PolicyGate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyGate")
            .field("policies", &self.policies.len())
            .finish()
    }
}

/// `Teacher#42`, or `guest` without a performer.
pub(crate) fn performer_label(performer: Option<&dyn Performer>) -> String {
    match performer {
        Some(performer) => format!("{}#{}", performer.kind(), performer.id()),
        None => "guest".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc {
        owner: u32,
        viewer: u32,
        admin: bool,
    }

    fn gate() -> PolicyGate<Doc> {
        let mut gate = PolicyGate::new();
        gate.allow_if(|doc: &Doc| doc.owner == doc.viewer);
        gate.allow_if(|doc: &Doc| doc.admin);
        gate
    }

    #[test]
    fn test_empty_gate_denies() {
        let gate: PolicyGate<Doc> = PolicyGate::new();
        assert!(!gate.evaluate(&Doc { owner: 1, viewer: 1, admin: true }));
    }

    #[test]
    fn test_any_policy() {
        let gate = gate();
        assert!(gate.evaluate(&Doc { owner: 1, viewer: 1, admin: false }));
        assert!(gate.evaluate(&Doc { owner: 1, viewer: 2, admin: true }));
        assert!(!gate.evaluate(&Doc { owner: 1, viewer: 2, admin: false }));
    }

    #[test]
    fn test_all_policies_strategy() {
        let mut gate = gate();
        gate.set_strategy(AllPolicies);
        assert!(!gate.evaluate(&Doc { owner: 1, viewer: 1, admin: false }));
        assert!(gate.evaluate(&Doc { owner: 1, viewer: 1, admin: true }));
    }

    #[test]
    fn test_performer_label() {
        struct Student;
        impl Performer for Student {
            fn kind(&self) -> &str {
                "Student"
            }
            fn id(&self) -> String {
                "7".into()
            }
        }

        assert_eq!(performer_label(Some(&Student)), "Student#7");
        assert_eq!(performer_label(None), "guest");
    }
}
