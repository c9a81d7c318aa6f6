//! Process-wide logging setup shared by the cart binaries and tests.

pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize tracing/logging in the given format.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    self::tracing::init(format);
}
