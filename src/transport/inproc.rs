// src/transport/inproc.rs

//! In-process loopback transport.
//!
//! Connects two sockets in the same process through a cross-wired pair of
//! bounded message queues. There is no wire format: whole messages move
//! between the peers with their boundaries intact, which makes this the
//! reference transport for exercising the socket core end to end.

use crate::error::NmqError;
use crate::message::Msg;
use crate::queue::{Deadline, MsgQueue};
use crate::socket::core::SocketCore;
use crate::socket::pipe::IPipeTransport;
use crate::transport::endpoint::{Endpoint, EpKind};
use crate::transport::{IEndpointTran, ITransport};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Depth of each direction of an inproc pipe.
const PIPE_DEPTH: usize = 16;

struct Binding {
  token: u64,
  sock: Weak<SocketCore>,
  ep_id: u32,
}

static BINDINGS: Lazy<Mutex<HashMap<String, Binding>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

pub struct InprocTransport;

impl ITransport for InprocTransport {
  fn scheme(&self) -> &'static str {
    "inproc"
  }

  fn endpoint(&self, addr: &str, _kind: EpKind) -> Result<Box<dyn IEndpointTran>, NmqError> {
    Ok(Box::new(InprocEp {
      name: addr.to_string(),
      token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
    }))
  }
}

struct InprocEp {
  name: String,
  token: u64,
}

impl InprocEp {
  fn uri(&self) -> String {
    format!("inproc://{}", self.name)
  }
}

impl IEndpointTran for InprocEp {
  fn bind(&self, sock: &Arc<SocketCore>, ep: &Arc<Endpoint>) -> Result<(), NmqError> {
    let mut map = BINDINGS.lock();
    if let Some(existing) = map.get(&self.name) {
      if existing.sock.upgrade().is_some() {
        return Err(NmqError::AddrInUse(self.uri()));
      }
    }
    map.insert(
      self.name.clone(),
      Binding {
        token: self.token,
        sock: Arc::downgrade(sock),
        ep_id: ep.id(),
      },
    );
    tracing::debug!(socket = sock.id(), name = %self.name, "inproc name bound");
    Ok(())
  }

  fn connect(&self, sock: &Arc<SocketCore>, ep: &Arc<Endpoint>) -> Result<(), NmqError> {
    let (listener_sock, listener_ep_id) = {
      let map = BINDINGS.lock();
      match map
        .get(&self.name)
        .and_then(|b| b.sock.upgrade().map(|s| (s, b.ep_id)))
      {
        Some(found) => found,
        None => return Err(NmqError::ConnectionRefused(self.uri())),
      }
    };

    // One queue per direction, cross-wired between the two pipe halves.
    let d_to_l = MsgQueue::new(PIPE_DEPTH);
    let l_to_d = MsgQueue::new(PIPE_DEPTH);
    let dial_tran = Box::new(InprocPipe {
      tx: d_to_l.clone(),
      rx: l_to_d.clone(),
    });
    let listen_tran = Box::new(InprocPipe { tx: l_to_d, rx: d_to_l });

    // Accept side first, so the dialing side sees a live peer the moment
    // its own pipe starts.
    let listener_ep = listener_sock.endpoint(listener_ep_id);
    let l_pipe = listener_sock
      .pipe_add(listen_tran, listener_ep.as_ref())
      .map_err(|_| NmqError::ConnectionRefused(self.uri()))?;
    if listener_sock.pipe_ready(&l_pipe).is_err() {
      l_pipe.close();
      return Err(NmqError::ConnectionRefused(self.uri()));
    }

    let d_pipe = match sock.pipe_add(dial_tran, Some(ep)) {
      Ok(p) => p,
      Err(e) => {
        l_pipe.close();
        return Err(e);
      }
    };
    if let Err(e) = sock.pipe_ready(&d_pipe) {
      d_pipe.close();
      l_pipe.close();
      return Err(e);
    }
    tracing::debug!(
      dialer = sock.id(),
      listener = listener_sock.id(),
      name = %self.name,
      "inproc connection established"
    );
    Ok(())
  }

  fn close(&self) {
    let mut map = BINDINGS.lock();
    if map.get(&self.name).map(|b| b.token) == Some(self.token) {
      map.remove(&self.name);
    }
  }
}

/// One half of an inproc pipe: sends into one queue, receives from the
/// other. Closing closes both queues, which unblocks the peer's workers
/// and makes its pipe wind down as well.
struct InprocPipe {
  tx: Arc<MsgQueue>,
  rx: Arc<MsgQueue>,
}

impl IPipeTransport for InprocPipe {
  fn send_msg(&self, msg: Msg) -> Result<(), NmqError> {
    self.tx.put(msg, Deadline::Infinite)
  }

  fn recv_msg(&self) -> Result<Msg, NmqError> {
    self.rx.get(Deadline::Infinite)
  }

  fn close(&self) {
    self.tx.close();
    self.rx.close();
  }
}
