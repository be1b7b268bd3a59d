// tests/common/mod.rs

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;

/// Installs a tracing subscriber once per test binary; RUST_LOG selects
/// verbosity.
pub fn init_tracing() {
  static INIT: Once = Once::new();
  INIT.call_once(|| {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .try_init();
  });
}

/// Returns a process-unique inproc endpoint, so tests never collide on
/// the global name registry.
pub fn unique_inproc_endpoint(tag: &str) -> String {
  static NEXT: AtomicU32 = AtomicU32::new(0);
  format!("inproc://rnmq-test-{}-{}", tag, NEXT.fetch_add(1, Ordering::Relaxed))
}
