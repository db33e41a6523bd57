//! Engine and per-context sessions.
//!
//! The [`Engine`] is shared; a [`Session`] is created per execution context
//! and owns that context's transaction stack.

mod config;
mod engine;
mod instrument;

pub use config::{EngineConfig, DEFAULT_MAX_DEPTH};
pub use engine::{Engine, Session};
pub use instrument::{
    ActionEvent, EventOutcome, Instrumentation, Subscriber, SubscriptionId, PERFORM_EVENT,
};
