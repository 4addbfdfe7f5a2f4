use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "AUTOSYNC_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global subscriber. A second call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
