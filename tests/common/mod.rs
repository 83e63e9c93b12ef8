use tracing_subscriber::EnvFilter;

/// Setup logging of events reported by tagwire and the test suite.
///
/// Use the RUST_LOG environment variable to override the defaults, e.g.
/// RUST_LOG=TRACE shows every skipped field.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .with_test_writer()
        .try_init()
        .ok();
}
