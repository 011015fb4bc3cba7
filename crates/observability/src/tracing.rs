//! JSON log output filtered through `EnvFilter`.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

/// Build the filter: `RUST_LOG`, else `fallback`, else [`DEFAULT_FILTER`].
/// A fallback that fails to parse is ignored.
pub fn filter(fallback: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| fallback.and_then(|f| EnvFilter::try_new(f).ok()))
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init(fallback: Option<&str>) {
    // Logs go to stderr so stdout stays free for command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(fallback))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
