//! `weighpoint-observability` — shared tracing/logging setup.

/// Initialize process-wide observability (tracing/logging).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init();
}

/// Human-readable variant for test binaries.
pub fn init_for_tests() {
    self::tracing::init_for_tests();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
