//! txflow - transactional business actions
//!
//! Every business operation is an [`action::Action`]: it passes a policy
//! gate, precondition checks and validation, then runs its body inside a
//! nested transaction frame. After-commit callbacks fire only once the
//! outermost frame commits.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, OnceLock};
//! use txflow::action::{Action, ActionDefinition, ActionState, Subject};
//! use txflow::session::Engine;
//! use txflow::storage::MemoryStore;
//!
//! struct Publish {
//!     state: ActionState,
//!     title: String,
//! }
//!
//! impl Subject for Publish {}
//!
//! impl Action for Publish {
//!     type Output = String;
//!
//!     fn definition(&self) -> Arc<ActionDefinition<Self>> {
//!         static DEFINITION: OnceLock<Arc<ActionDefinition<Publish>>> = OnceLock::new();
//!         DEFINITION
//!             .get_or_init(|| {
//!                 ActionDefinition::<Publish>::builder("Publish")
//!                     .allow_if(|_| true)
//!                     .precondition(|publish, ctx| {
//!                         if publish.title.is_empty() {
//!                             ctx.decline_with("title is missing");
//!                         }
//!                     })
//!                     .perform(|publish, _session, _options| Ok(format!("published {}", publish.title)))
//!                     .build()
//!             })
//!             .clone()
//!     }
//!
//!     fn state(&self) -> &ActionState {
//!         &self.state
//!     }
//!
//!     fn state_mut(&mut self) -> &mut ActionState {
//!         &mut self.state
//!     }
//! }
//!
//! let engine = Engine::new(MemoryStore::new());
//! let session = engine.session();
//!
//! let mut publish = Publish { state: ActionState::new(), title: "Hello".into() };
//! assert_eq!(publish.perform(&session).unwrap(), Some("published Hello".to_string()));
//!
//! let mut untitled = Publish { state: ActionState::new(), title: String::new() };
//! assert_eq!(untitled.try_perform(&session).unwrap(), None);
//! assert_eq!(untitled.errors().base(), vec!["title is missing"]);
//! ```

pub mod action;
pub mod logging;
pub mod session;
pub mod storage;
pub mod transaction;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;
