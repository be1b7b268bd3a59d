// src/protocol/pair.rs

//! One-to-one pair protocol.
//!
//! Exactly one pipe carries traffic at a time; a second peer asking to
//! attach is rejected until the current one goes away. Each accepted pipe
//! gets a sender worker draining the socket's upper write queue onto the
//! pipe and a receiver worker feeding inbound messages into the upper
//! read queue. This is the reference op-table implementation: it touches
//! every registration surface the core exposes and nothing else.

use crate::error::NmqError;
use crate::protocol::{ids, IPipeOps, ISockOps, ProtocolDef};
use crate::queue::Deadline;
use crate::socket::core::SocketCore;
use crate::socket::pipe::Pipe;

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// How often the sender worker wakes to check whether its pipe has gone
/// away while it sat parked on the shared write queue. A worker that kept
/// parking there after its pipe closed would swallow a message meant for
/// the replacement pipe.
const CLOSE_POLL: Duration = Duration::from_millis(100);

/// Registration record for the pair protocol.
pub fn protocol() -> ProtocolDef {
  ProtocolDef {
    id: ids::PAIR,
    peer: ids::PAIR,
    name: "pair",
    open: open_sock,
  }
}

fn open_sock(sock: &Arc<SocketCore>) -> Result<Arc<dyn ISockOps>, NmqError> {
  Ok(Arc::new(PairSock {
    sock: Arc::downgrade(sock),
    peer: Mutex::new(None),
  }))
}

struct PairSock {
  sock: Weak<SocketCore>,
  /// Pipe currently carrying traffic.
  peer: Mutex<Option<u32>>,
}

impl ISockOps for PairSock {
  fn pipe_ready(&self, pipe: &Arc<Pipe>) -> Result<(), NmqError> {
    let mut peer = self.peer.lock();
    if peer.is_some() {
      tracing::debug!(pipe_id = pipe.id(), "pair already has a peer, rejecting pipe");
      return Err(NmqError::Protocol(libc::EISCONN));
    }
    *peer = Some(pipe.id());
    Ok(())
  }

  fn pipe_closed(&self, pipe: &Arc<Pipe>) {
    let mut peer = self.peer.lock();
    if *peer == Some(pipe.id()) {
      *peer = None;
    }
  }

  fn create_pipe_ops(&self, _pipe: &Arc<Pipe>) -> Result<Box<dyn IPipeOps>, NmqError> {
    Ok(Box::new(PairPipe {
      sock: self.sock.clone(),
    }))
  }
}

struct PairPipe {
  sock: Weak<SocketCore>,
}

impl IPipeOps for PairPipe {
  fn start(&self, pipe: &Arc<Pipe>) -> Result<(), NmqError> {
    let sock = self.sock.upgrade().ok_or(NmqError::Closed)?;
    spawn_sender(sock.clone(), pipe.clone())?;
    spawn_receiver(sock, pipe.clone())?;
    Ok(())
  }

  fn stop(&self) {
    // the workers unblock through the closed pipe and queues
  }
}

/// Drains the upper write queue onto the pipe until either side closes.
/// The worker's `Arc<Pipe>` clone is what keeps the pipe record alive for
/// the whole ready-to-closed interval.
fn spawn_sender(sock: Arc<SocketCore>, pipe: Arc<Pipe>) -> Result<(), NmqError> {
  std::thread::Builder::new()
    .name(format!("rnmq-pair-snd-{}", pipe.id()))
    .spawn(move || {
      loop {
        let msg = match sock.sendq().get(Deadline::At(Instant::now() + CLOSE_POLL)) {
          Ok(msg) => msg,
          Err(NmqError::TimedOut) => {
            if pipe.is_closed() {
              break;
            }
            continue;
          }
          Err(_) => break,
        };
        if pipe.is_closed() {
          // the message belongs to whatever pipe replaces this one
          let _ = sock.sendq().put_back(msg);
          break;
        }
        if let Err(e) = pipe.send_msg(msg) {
          tracing::debug!(socket = sock.id(), pipe_id = pipe.id(), error = %e, "send worker stopping");
          break;
        }
      }
      pipe.close();
    })
    .map_err(NmqError::Io)?;
  Ok(())
}

/// Feeds inbound messages into the upper read queue until either side
/// closes or a message is rejected (oversize closes the pipe).
fn spawn_receiver(sock: Arc<SocketCore>, pipe: Arc<Pipe>) -> Result<(), NmqError> {
  std::thread::Builder::new()
    .name(format!("rnmq-pair-rcv-{}", pipe.id()))
    .spawn(move || {
      loop {
        let msg = match pipe.recv_msg() {
          Ok(msg) => msg,
          Err(e) => {
            tracing::debug!(socket = sock.id(), pipe_id = pipe.id(), error = %e, "recv worker stopping");
            break;
          }
        };
        if sock.recvq().put(msg, Deadline::Infinite).is_err() {
          break;
        }
      }
      pipe.close();
    })
    .map_err(NmqError::Io)?;
  Ok(())
}
