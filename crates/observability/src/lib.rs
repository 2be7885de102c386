//! Process-wide tracing/logging setup.

/// Tracing configuration (filters, formatters).
pub mod tracing;

/// Initialize logging with JSON output and `info` as the fallback filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info", true);
}

/// Initialize logging with an explicit fallback filter and output format.
pub fn init_with(default_filter: &str, json: bool) {
    tracing::init(default_filter, json);
}
