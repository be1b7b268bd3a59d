// src/socket/registry.rs

//! Process-wide socket table.
//!
//! Sockets are reachable by numeric id (`hold`) from any thread without
//! racing teardown: the table keeps one reference from open until close
//! completes, and holders keep their own. A socket record is freed only
//! once it has been removed here and the last outstanding hold drops.

use crate::socket::core::SocketCore;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static SOCKETS: Lazy<RwLock<HashMap<u32, Arc<SocketCore>>>> =
  Lazy::new(|| RwLock::new(HashMap::new()));
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_id() -> u32 {
  NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn register(sock: Arc<SocketCore>) {
  let id = sock.id();
  SOCKETS.write().insert(id, sock);
  tracing::debug!(socket = id, "socket registered");
}

pub(crate) fn unregister(id: u32) {
  if SOCKETS.write().remove(&id).is_some() {
    tracing::debug!(socket = id, "socket deregistered");
  }
}

pub(crate) fn lookup(id: u32) -> Option<Arc<SocketCore>> {
  SOCKETS.read().get(&id).cloned()
}
