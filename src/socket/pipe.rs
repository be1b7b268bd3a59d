// src/socket/pipe.rs

use crate::error::NmqError;
use crate::message::Msg;
use crate::socket::core::SocketCore;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Which socket-owned list a registered pipe currently sits in. A pipe is
/// in exactly one list from registration to removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeList {
  /// Registered, not yet accepted by the protocol.
  Idle,
  /// Accepted; eligible for traffic.
  Ready,
  /// Traffic stopped; awaiting deregistration.
  Closing,
}

/// Transport half of a pipe. The core and the protocol move whole
/// messages through it without knowing what carries the bytes.
pub trait IPipeTransport: Send + Sync {
  /// Transmits one message; may block until the peer drains.
  fn send_msg(&self, msg: Msg) -> Result<(), NmqError>;
  /// Receives one message; blocks until one arrives or the pipe closes.
  fn recv_msg(&self) -> Result<Msg, NmqError>;
  /// Stops traffic in both directions, unblocking parked workers.
  fn close(&self);
}

/// One established logical connection between a socket and a peer.
///
/// Pipes are created by transports, registered into their socket's idle
/// list, promoted to ready once the protocol accepts them, and removed on
/// close — never resurrected. Protocol workers keep `Arc<Pipe>` clones for
/// exactly the ready-to-closed interval, which is what guarantees the
/// record outlives the traffic path.
pub struct Pipe {
  id: u32,
  sock: Weak<SocketCore>,
  ep_id: Option<u32>,
  tran: Box<dyn IPipeTransport>,
  closed: AtomicBool,
}

impl Pipe {
  pub(crate) fn new(
    id: u32,
    sock: &Arc<SocketCore>,
    ep_id: Option<u32>,
    tran: Box<dyn IPipeTransport>,
  ) -> Arc<Self> {
    Arc::new(Self {
      id,
      sock: Arc::downgrade(sock),
      ep_id,
      tran,
      closed: AtomicBool::new(false),
    })
  }

  /// Pipe id, unique within the owning socket.
  pub fn id(&self) -> u32 {
    self.id
  }

  /// The endpoint this pipe belongs to, if any. Accepted pipes whose
  /// listener has gone away carry `None`.
  pub fn endpoint_id(&self) -> Option<u32> {
    self.ep_id
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  /// Sends one message over the transport half.
  pub fn send_msg(&self, msg: Msg) -> Result<(), NmqError> {
    if self.is_closed() {
      return Err(NmqError::Closed);
    }
    self.tran.send_msg(msg)
  }

  /// Receives one message, enforcing the owning socket's receive-size
  /// limit: an oversized message is rejected here and can never reach the
  /// upper read queue.
  pub fn recv_msg(&self) -> Result<Msg, NmqError> {
    let msg = self.tran.recv_msg()?;
    let sock = self.sock.upgrade().ok_or(NmqError::Closed)?;
    let maxsz = sock.rcvmaxsz();
    if maxsz != 0 && msg.size() > maxsz {
      tracing::warn!(
        pipe_id = self.id,
        size = msg.size(),
        limit = maxsz,
        "rejecting oversized inbound message"
      );
      return Err(NmqError::MessageTooLarge);
    }
    Ok(msg)
  }

  /// Closes the pipe. Idempotent: the first caller stops transport
  /// traffic, notifies the socket (`pipe_closed`) and deregisters
  /// (`pipe_rem`); later callers return immediately.
  pub fn close(self: &Arc<Self>) {
    if self.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    self.tran.close();
    if let Some(sock) = self.sock.upgrade() {
      sock.pipe_closed(self);
      sock.pipe_rem(self);
    }
  }
}

impl fmt::Debug for Pipe {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipe")
      .field("id", &self.id)
      .field("ep_id", &self.ep_id)
      .field("closed", &self.is_closed())
      .finish()
  }
}
