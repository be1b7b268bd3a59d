// src/transport/endpoint.rs

use crate::error::NmqError;
use crate::socket::core::SocketCore;
use crate::transport::IEndpointTran;

use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

bitflags! {
  /// Flags accepted by dial/listen.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct EpFlags: u32 {
    /// Block until the first connection attempt resolves and surface its
    /// outcome to the caller; without it, attempts run in the background
    /// and failures feed the retry loop.
    const SYNCH = 0b0001;
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpKind {
  Dial,
  Listen,
}

struct EpState {
  closing: bool,
  /// Pipes currently owned by this endpoint.
  pipes: HashSet<u32>,
  worker: Option<JoinHandle<()>>,
}

/// One dial or listen configuration registered on a socket.
///
/// A dialing endpoint owns a worker thread that re-establishes a pipe
/// whenever the previous one is lost, backing off from the socket's
/// reconnect interval up to the configured cap and resetting on success.
pub struct Endpoint {
  id: u32,
  addr: String,
  kind: EpKind,
  tran: Box<dyn IEndpointTran>,
  state: Mutex<EpState>,
  cv: Condvar,
}

impl Endpoint {
  pub(crate) fn new(id: u32, addr: String, kind: EpKind, tran: Box<dyn IEndpointTran>) -> Arc<Self> {
    Arc::new(Self {
      id,
      addr,
      kind,
      tran,
      state: Mutex::new(EpState {
        closing: false,
        pipes: HashSet::new(),
        worker: None,
      }),
      cv: Condvar::new(),
    })
  }

  /// Endpoint id, unique within the owning socket.
  pub fn id(&self) -> u32 {
    self.id
  }

  pub fn address(&self) -> &str {
    &self.addr
  }

  pub fn kind(&self) -> EpKind {
    self.kind
  }

  pub(crate) fn transport(&self) -> &dyn IEndpointTran {
    &*self.tran
  }

  /// Records a pipe created under this endpoint. Returns false when the
  /// endpoint is already closing, in which case the caller must close the
  /// pipe instead of leaving it orphaned.
  pub(crate) fn pipe_attached(&self, pipe_id: u32) -> bool {
    let mut st = self.state.lock();
    if st.closing {
      return false;
    }
    st.pipes.insert(pipe_id);
    true
  }

  /// Forgets a closed pipe. Wakes the redial worker (to reconnect) and
  /// any closer waiting for the endpoint's pipes to drain.
  pub(crate) fn pipe_detached(&self, pipe_id: u32) {
    let mut st = self.state.lock();
    if st.pipes.remove(&pipe_id) {
      self.cv.notify_all();
    }
  }

  /// Spawns the redial worker. `connected` reports whether a synchronous
  /// first attempt already established a pipe.
  pub(crate) fn start_dialer(
    self: &Arc<Self>,
    sock: &Arc<SocketCore>,
    connected: bool,
  ) -> Result<(), NmqError> {
    let ep = Arc::clone(self);
    let sock = Arc::clone(sock);
    let handle = std::thread::Builder::new()
      .name(format!("rnmq-dial-{}", self.id))
      .spawn(move || run_dialer(ep, sock, connected))
      .map_err(NmqError::Io)?;
    self.state.lock().worker = Some(handle);
    Ok(())
  }

  /// Closes the endpoint: stops redialing, requests closure of every
  /// owned pipe, waits for the matching `pipe_closed` notifications, then
  /// deregisters from the socket.
  pub(crate) fn close(self: &Arc<Self>, sock: &Arc<SocketCore>) {
    {
      let mut st = self.state.lock();
      st.closing = true;
      self.cv.notify_all();
    }
    self.tran.close();
    for pipe in sock.pipes_for_endpoint(self.id) {
      pipe.close();
    }
    let worker = {
      let mut st = self.state.lock();
      while !st.pipes.is_empty() {
        self.cv.wait(&mut st);
      }
      st.worker.take()
    };
    if let Some(worker) = worker {
      let _ = worker.join();
    }
    sock.ep_rem(self.id);
    tracing::debug!(socket = sock.id(), endpoint = self.id, "endpoint closed");
  }
}

impl fmt::Debug for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Endpoint")
      .field("id", &self.id)
      .field("addr", &self.addr)
      .field("kind", &self.kind)
      .finish()
  }
}

/// Redial loop: park while the endpoint owns a live pipe, otherwise
/// attempt a connection, backing off between failures.
fn run_dialer(ep: Arc<Endpoint>, sock: Arc<SocketCore>, mut connected: bool) {
  let mut ivl = sock.reconnect_ivl();
  loop {
    {
      let mut st = ep.state.lock();
      while !st.closing && !st.pipes.is_empty() {
        ep.cv.wait(&mut st);
      }
      if st.closing {
        return;
      }
    }
    if connected {
      // previous pipe just went away; restart from the base interval
      ivl = sock.reconnect_ivl();
      connected = false;
    }
    match ep.transport().connect(&sock, &ep) {
      Ok(()) => {
        tracing::debug!(socket = sock.id(), endpoint = ep.id, "dial established");
        connected = true;
        ivl = sock.reconnect_ivl();
      }
      Err(e) => {
        tracing::debug!(
          socket = sock.id(),
          endpoint = ep.id,
          error = %e,
          "dial attempt failed, backing off"
        );
        let deadline = Instant::now() + ivl;
        {
          let mut st = ep.state.lock();
          while !st.closing {
            if ep.cv.wait_until(&mut st, deadline).timed_out() {
              break;
            }
          }
          if st.closing {
            return;
          }
        }
        ivl = next_interval(ivl, sock.reconnect_ivl_max());
      }
    }
  }
}

fn next_interval(cur: Duration, max: Duration) -> Duration {
  if max.is_zero() {
    // backoff growth disabled
    return cur;
  }
  (cur * 2).min(max)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_doubles_to_cap() {
    let max = Duration::from_millis(800);
    let mut ivl = Duration::from_millis(100);
    let mut seen = Vec::new();
    for _ in 0..5 {
      ivl = next_interval(ivl, max);
      seen.push(ivl.as_millis());
    }
    assert_eq!(seen, vec![200, 400, 800, 800, 800]);
  }

  #[test]
  fn backoff_disabled_without_cap() {
    let ivl = Duration::from_millis(250);
    assert_eq!(next_interval(ivl, Duration::ZERO), ivl);
  }
}
