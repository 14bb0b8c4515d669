//! Shared helpers for datamill's integration tests.

pub mod builders;
pub mod recording_handler;

use std::sync::Once;

use datamill::logging::LOG_ENV_VAR;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Output goes through `with_test_writer()`, so it only shows up for failing
/// tests (or with `-- --nocapture`). The level comes from `DATAMILL_LOG`,
/// e.g. `DATAMILL_LOG=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}
