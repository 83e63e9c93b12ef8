use tracing_subscriber::EnvFilter;

/// Setup logging of events reported by tagwire in unit tests.
///
/// Use the RUST_LOG environment variable to override the defaults.
///
/// E.g. To see which unknown fields are skipped or rejected:
///   RUST_LOG=tagwire=TRACE
///
/// Or to only see records rejected during decoding:
///   RUST_LOG=tagwire::record=DEBUG
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .with_test_writer()
        .try_init()
        .ok();
}
