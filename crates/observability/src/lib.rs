//! Process-wide logging setup shared by the binaries.

/// Subscriber configuration (filters, JSON output).
pub mod tracing;

/// Initialize logging with the `RUST_LOG` filter, falling back to `info`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(None);
}

/// Initialize logging. `RUST_LOG` wins over `fallback`, which wins over `info`.
pub fn init_with_filter(fallback: Option<&str>) {
    tracing::init(fallback);
}
