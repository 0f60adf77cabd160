//! Structured debug logging system

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Debug logger for structured logging
#[derive(Debug, Default)]
pub struct DebugLogger;

impl DebugLogger {
    /// Initialize the global `tracing` subscriber
    ///
    /// Honours `RUST_LOG` and falls back to `default_directive` (e.g.
    /// `"info"` or `"vidinject=debug"`). Safe to call repeatedly; only the
    /// first call installs a subscriber, and an already-installed subscriber
    /// from the host application is left alone.
    pub fn init_logging(default_directive: &str) {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive));

            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .try_init();
        });
    }

    /// Initialize logging for tests, writing through the test harness capture
    pub fn init_test_logging() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("debug"))
                .with_test_writer()
                .try_init();
        });
    }
}
