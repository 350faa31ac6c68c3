//! Observability for the session client.
//!
//! Provides structured tracing spans and local metrics for the request and
//! renewal paths.
//!
//! ## Subscriber
//!
//! Libraries normally leave subscriber installation to the application. The
//! `subscriber` feature adds [`init_tracing`] for binaries and tests that
//! want a ready-made `tracing-subscriber` setup:
//!
//! ```toml
//! session-client = { version = "0.1", features = ["subscriber"] }
//! ```

mod metrics;
mod spans;

pub use metrics::{AuthMetrics, AuthMetricsSnapshot, Counter, Gauge};
pub use spans::{RequestSpan, TracingConfig, TracingLevel, refresh_span};

/// Install a global `fmt` subscriber filtered by `config`.
///
/// Returns `false` when tracing is disabled or a subscriber is already set.
#[cfg(feature = "subscriber")]
pub fn init_tracing(config: &TracingConfig) -> bool {
    use tracing_subscriber::EnvFilter;

    if !config.enabled {
        return false;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
