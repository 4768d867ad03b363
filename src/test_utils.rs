//! Helpers shared by unit and integration tests.

/// Installs a tracing subscriber writing to the test harness, once.
///
/// Honors `RUST_LOG`; repeated calls are no-ops. Does nothing when the
/// `test-internals` feature is disabled.
pub fn init_test_logging() {
    #[cfg(feature = "test-internals")]
    {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}
