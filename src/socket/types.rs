// src/socket/types.rs

use crate::error::NmqError;
use crate::message::Msg;
use crate::queue::Deadline;
use crate::socket::core::SocketCore;
use crate::socket::events::{EventKind, NotifyCallback, NotifyHandle};
use crate::transport::EpFlags;

use std::fmt;
use std::sync::Arc;

/// The public handle for one socket.
///
/// Handles are cloneable and shareable across threads; every operation
/// synchronizes internally. Dropping a handle releases one hold on the
/// socket — the socket itself lives until [`Socket::close`] (or
/// [`Socket::shutdown`]) completes and the last hold drops.
#[derive(Clone)]
pub struct Socket {
  core: Arc<SocketCore>,
}

impl Socket {
  /// Opens a socket speaking the given protocol number.
  pub fn open(protocol: u16) -> Result<Self, NmqError> {
    Ok(Self {
      core: SocketCore::open(protocol)?,
    })
  }

  /// Obtains a handle to an existing socket by id. Fails with
  /// [`NmqError::NotFound`] once the socket has been destroyed.
  pub fn hold(id: u32) -> Result<Self, NmqError> {
    Ok(Self {
      core: SocketCore::hold(id)?,
    })
  }

  /// The underlying core, for protocol and transport implementations.
  pub fn core(&self) -> &Arc<SocketCore> {
    &self.core
  }

  pub fn id(&self) -> u32 {
    self.core.id()
  }

  pub fn proto(&self) -> u16 {
    self.core.proto()
  }

  pub fn peer(&self) -> u16 {
    self.core.peer()
  }

  /// Sends a message using the configured send timeout.
  pub fn send<M: Into<Msg>>(&self, msg: M) -> Result<(), NmqError> {
    self.core.send(msg.into())
  }

  /// Sends a message with an explicit deadline.
  pub fn send_msg<M: Into<Msg>>(&self, msg: M, deadline: Deadline) -> Result<(), NmqError> {
    self.core.send_msg(msg.into(), deadline)
  }

  /// Receives a message using the configured receive timeout.
  pub fn recv(&self) -> Result<Msg, NmqError> {
    self.core.recv()
  }

  /// Receives a message with an explicit deadline.
  pub fn recv_msg(&self, deadline: Deadline) -> Result<Msg, NmqError> {
    self.core.recv_msg(deadline)
  }

  /// Sets a socket option from a typed value.
  pub fn set_option<T: ToBytes>(&self, option: i32, value: T) -> Result<(), NmqError> {
    self.core.set_option(option, &value.to_bytes())
  }

  /// Sets a socket option from raw bytes. The value must carry exactly
  /// the option's expected size.
  pub fn set_option_raw(&self, option: i32, value: &[u8]) -> Result<(), NmqError> {
    self.core.set_option(option, value)
  }

  /// Reads a socket option as raw bytes.
  pub fn get_option(&self, option: i32) -> Result<Vec<u8>, NmqError> {
    self.core.get_option(option)
  }

  /// Starts dialing `addr` (e.g. `inproc://name`). Returns the endpoint
  /// id, usable with [`Socket::close_endpoint`].
  pub fn dial(&self, addr: &str, flags: EpFlags) -> Result<u32, NmqError> {
    self.core.dial(addr, flags)
  }

  /// Starts listening on `addr`. Returns the endpoint id.
  pub fn listen(&self, addr: &str, flags: EpFlags) -> Result<u32, NmqError> {
    self.core.listen(addr, flags)
  }

  /// Closes one endpoint, waiting for its pipes to wind down.
  pub fn close_endpoint(&self, ep_id: u32) -> Result<(), NmqError> {
    self.core.close_endpoint(ep_id)
  }

  /// Registers a readiness callback.
  pub fn notify(&self, kind: EventKind, cb: NotifyCallback) -> Result<NotifyHandle, NmqError> {
    self.core.notify(kind, cb)
  }

  /// Removes a readiness callback registration.
  pub fn unnotify(&self, handle: NotifyHandle) {
    self.core.unnotify(handle)
  }

  /// Gracefully closes the socket, draining up to the linger interval.
  pub fn close(&self) {
    self.core.close()
  }

  /// Closes the socket immediately, without draining.
  pub fn shutdown(&self) {
    self.core.shutdown()
  }
}

impl fmt::Debug for Socket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Socket").field("id", &self.id()).finish()
  }
}

/// Conversion of typed option values into the raw native-endian byte form
/// the option surface expects.
pub trait ToBytes {
  fn to_bytes(&self) -> Vec<u8>;
}

impl ToBytes for Vec<u8> {
  fn to_bytes(&self) -> Vec<u8> {
    self.to_vec()
  }
}

impl ToBytes for &[u8] {
  fn to_bytes(&self) -> Vec<u8> {
    self.to_vec()
  }
}

impl<const N: usize> ToBytes for &[u8; N] {
  fn to_bytes(&self) -> Vec<u8> {
    self.to_vec()
  }
}

impl ToBytes for i32 {
  fn to_bytes(&self) -> Vec<u8> {
    self.to_ne_bytes().to_vec()
  }
}

impl ToBytes for u32 {
  fn to_bytes(&self) -> Vec<u8> {
    self.to_ne_bytes().to_vec()
  }
}

impl ToBytes for usize {
  fn to_bytes(&self) -> Vec<u8> {
    self.to_ne_bytes().to_vec()
  }
}

impl ToBytes for bool {
  fn to_bytes(&self) -> Vec<u8> {
    // booleans travel as i32 0/1, like every other integer option
    let v = if *self { 1i32 } else { 0i32 };
    v.to_ne_bytes().to_vec()
  }
}
