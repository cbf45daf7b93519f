//! Process-wide tracing setup shared by quotedesk binaries and tests.

pub mod tracing;

/// Install the JSON subscriber.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}
