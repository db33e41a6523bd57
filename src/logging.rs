//! Structured logging setup.
//!
//! The library only emits `tracing` events; binaries and tests that want to
//! see them call [`init_logging`] once.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directives, e.g. `txflow=debug`.
pub const LOG_ENV: &str = "TXFLOW_LOG";

/// Set to `json` for JSON lines output.
pub const LOG_FORMAT_ENV: &str = "TXFLOW_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a global fmt subscriber. Safe to call more than once.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let json = wants_json(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(env_filter())
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(env_filter())
                .boxed()
        };

        // Another subscriber (e.g. from a test harness) wins.
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("global tracing subscriber already set");
            return;
        }

        tracing::debug!(json, "logging initialized");
    });
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn wants_json(format: Option<&str>) -> bool {
    matches!(format, Some(value) if value.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_json() {
        assert!(wants_json(Some("json")));
        assert!(wants_json(Some("JSON")));
        assert!(!wants_json(Some("pretty")));
        assert!(!wants_json(None));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
        assert!(LOGGER_INITIALIZED.get().is_some());
    }
}
