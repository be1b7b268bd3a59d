// src/transport/mod.rs

//! Transport registration surface.
//!
//! The core performs no network I/O itself. A transport registers here
//! under its URI scheme; dial/listen resolve the scheme, build an
//! endpoint-transport object, and hand control over. Transports call back
//! into the socket through `pipe_add`/`pipe_ready` when connections are
//! established.

use crate::error::NmqError;
use crate::socket::core::SocketCore;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub mod endpoint;
#[cfg(feature = "inproc")]
pub mod inproc;

pub use endpoint::{Endpoint, EpFlags, EpKind};

/// A transport implementation, registered by URI scheme.
pub trait ITransport: Send + Sync {
  fn scheme(&self) -> &'static str;

  /// Builds the transport half of an endpoint for `addr` (the part after
  /// `scheme://`).
  fn endpoint(&self, addr: &str, kind: EpKind) -> Result<Box<dyn IEndpointTran>, NmqError>;
}

/// Transport half of one endpoint.
pub trait IEndpointTran: Send + Sync {
  /// One connection attempt. On success the transport has registered a
  /// pipe with the socket; on failure the endpoint's retry loop decides
  /// what happens next.
  fn connect(&self, sock: &Arc<SocketCore>, ep: &Arc<Endpoint>) -> Result<(), NmqError>;

  /// Binds the endpoint so peers can reach it. Errors surface to the
  /// `listen` caller synchronously.
  fn bind(&self, sock: &Arc<SocketCore>, ep: &Arc<Endpoint>) -> Result<(), NmqError>;

  /// Stops accepting/attempting connections.
  fn close(&self);
}

static TRANSPORTS: Lazy<RwLock<HashMap<&'static str, Arc<dyn ITransport>>>> = Lazy::new(|| {
  #[allow(unused_mut)]
  let mut map: HashMap<&'static str, Arc<dyn ITransport>> = HashMap::new();
  #[cfg(feature = "inproc")]
  {
    let t: Arc<dyn ITransport> = Arc::new(inproc::InprocTransport);
    map.insert(t.scheme(), t);
  }
  RwLock::new(map)
});

/// Registers a transport, replacing any previous one for the scheme.
pub fn register(transport: Arc<dyn ITransport>) {
  tracing::debug!(scheme = transport.scheme(), "transport registered");
  TRANSPORTS.write().insert(transport.scheme(), transport);
}

pub(crate) fn lookup(scheme: &str) -> Result<Arc<dyn ITransport>, NmqError> {
  TRANSPORTS
    .read()
    .get(scheme)
    .cloned()
    .ok_or_else(|| NmqError::UnsupportedTransport(scheme.to_string()))
}

/// Splits an endpoint string into `(scheme, address)`.
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<(&str, &str), NmqError> {
  let invalid = || NmqError::InvalidEndpoint(endpoint.to_string());
  let sep = endpoint.find("://").ok_or_else(invalid)?;
  let scheme = &endpoint[..sep];
  let addr = &endpoint[sep + 3..];
  if scheme.is_empty() || addr.is_empty() || addr.contains('\0') {
    return Err(invalid());
  }
  Ok((scheme, addr))
}
