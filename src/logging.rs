//! Tracing subscriber setup for internal, developer-facing diagnostics.
//!
//! This is strictly additive to the user-facing contract in spec.md 6:
//! the single fixed stderr line for a fatal error is always printed
//! directly by `main`, never through this subscriber. Because the
//! environment is cleared before any other work (spec.md 5), the filter
//! here is a fixed constant rather than read from `RUST_LOG` -- there is
//! no environment left to read it from by the time this runs.
use tracing_subscriber::EnvFilter;

/// Default verbosity for the tracing subscriber. Deliberately not derived
/// from `RUST_LOG`; see the module docs.
const DEFAULT_FILTER: &str = "warn";

/// Install a stderr-writing tracing subscriber with a fixed filter.
///
/// Idempotent in the sense that a second call is harmless (the
/// underlying `set_global_default` error is ignored) -- useful for tests
/// that exercise more than one pipeline stage in the same process.
pub fn init() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(DEFAULT_FILTER))
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
