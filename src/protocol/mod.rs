// src/protocol/mod.rs

//! Protocol operation tables and the process-wide protocol registry.
//!
//! A concrete protocol plugs into the socket core by registering a
//! [`ProtocolDef`]; the core then drives the protocol exclusively through
//! the two operation-table traits. The core never inspects protocol
//! state — the trait objects own it, and dropping them is the destruction
//! hook. Every op-table call is made with no socket lock held, so protocol
//! code is free to re-enter the socket.

use crate::error::NmqError;
use crate::socket::core::SocketCore;
use crate::socket::pipe::Pipe;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "pair")]
pub mod pair;

/// Protocol numbers of the scalability-protocols family.
pub mod ids {
  pub const PAIR: u16 = 16;
  pub const PUB: u16 = 32;
  pub const SUB: u16 = 33;
  pub const REQ: u16 = 48;
  pub const REP: u16 = 49;
  pub const PUSH: u16 = 80;
  pub const PULL: u16 = 81;
  pub const SURVEYOR: u16 = 98;
  pub const RESPONDENT: u16 = 99;
  pub const BUS: u16 = 112;
}

/// Socket-level operations supplied by a protocol.
pub trait ISockOps: Send + Sync {
  /// Called once while the socket tears down, after queues are closed and
  /// all pipes and endpoints have deregistered.
  fn close(&self) {}

  /// A registered pipe asks to carry traffic. Returning an error rejects
  /// the pipe (for example when a one-peer protocol already has one); the
  /// core closes it.
  fn pipe_ready(&self, pipe: &Arc<Pipe>) -> Result<(), NmqError>;

  /// A previously accepted pipe stopped carrying traffic.
  fn pipe_closed(&self, pipe: &Arc<Pipe>);

  /// Builds the protocol-private state for a newly registered pipe. The
  /// returned object is dropped when the pipe deregisters.
  fn create_pipe_ops(&self, pipe: &Arc<Pipe>) -> Result<Box<dyn IPipeOps>, NmqError>;

  /// Offers a protocol-specific option write; `Ok(true)` when handled.
  fn set_option(&self, _option: i32, _value: &[u8]) -> Result<bool, NmqError> {
    Ok(false)
  }

  /// Offers a protocol-specific option read; `Ok(Some(..))` when handled.
  fn get_option(&self, _option: i32) -> Result<Option<Vec<u8>>, NmqError> {
    Ok(None)
  }
}

/// Pipe-level operations supplied by a protocol.
pub trait IPipeOps: Send + Sync {
  /// Begins traffic on an accepted pipe, typically by spawning the
  /// protocol's per-pipe worker threads.
  fn start(&self, pipe: &Arc<Pipe>) -> Result<(), NmqError>;

  /// Stops traffic. The pipe's transport half is already closed when this
  /// runs, so parked workers are on their way out.
  fn stop(&self);
}

/// Registration record for one protocol.
#[derive(Clone)]
pub struct ProtocolDef {
  /// Protocol number this definition answers to.
  pub id: u16,
  /// Protocol number of the acceptable peer.
  pub peer: u16,
  pub name: &'static str,
  /// Builds the socket-level op table for a newly opened socket.
  pub open: fn(&Arc<SocketCore>) -> Result<Arc<dyn ISockOps>, NmqError>,
}

static PROTOCOLS: Lazy<RwLock<HashMap<u16, ProtocolDef>>> = Lazy::new(|| {
  #[allow(unused_mut)]
  let mut map: HashMap<u16, ProtocolDef> = HashMap::new();
  #[cfg(feature = "pair")]
  {
    let def = pair::protocol();
    map.insert(def.id, def);
  }
  RwLock::new(map)
});

/// Registers a protocol, replacing any previous registration under the
/// same number.
pub fn register(def: ProtocolDef) {
  tracing::debug!(protocol = def.id, name = def.name, "protocol registered");
  PROTOCOLS.write().insert(def.id, def);
}

pub(crate) fn lookup(id: u16) -> Result<ProtocolDef, NmqError> {
  PROTOCOLS
    .read()
    .get(&id)
    .cloned()
    .ok_or(NmqError::InvalidProtocol(id))
}
