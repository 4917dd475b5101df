//! Thin `tracing-subscriber` init helpers. The runtime itself only emits
//! `tracing` events (see `scheduler::resubscribe`'s `tracing::warn!`); it
//! never installs a subscriber on its own, so a binary embedding this
//! crate picks its own format/destination.

use tracing_subscriber::EnvFilter;

/// Installs a default `fmt` subscriber reading `RUST_LOG`, falling back to
/// `info` when unset. Intended for small demo binaries; a real service
/// will likely configure its own subscriber instead of calling this.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Installs a subscriber suitable for `#[test]` functions: writes to the
/// test harness's captured stdout and ignores a second call from another
/// test in the same process.
pub fn init_for_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
