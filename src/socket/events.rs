// src/socket/events.rs

//! Readiness signaling for send/receive availability.
//!
//! Two edge-triggered event classes are tracked per socket: `SendReady`
//! (the upper write queue has room) and `RecvReady` (the upper read queue
//! holds a message). Observers register callbacks, or fetch a readiness
//! file descriptor suitable for poll/select integration (Unix).

use crate::error::NmqError;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::io::RawFd;

/// Event classes a socket can signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  /// The socket can accept a send without blocking.
  SendReady,
  /// A message is waiting to be received.
  RecvReady,
}

/// Callback invoked on a readiness rising edge. Called with no socket or
/// queue lock held; re-entering the socket from the callback is allowed.
pub type NotifyCallback = Arc<dyn Fn(EventKind) + Send + Sync>;

/// Registration token returned by `notify`, consumed by `unnotify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyHandle {
  id: u64,
}

struct NotifyEntry {
  id: u64,
  kind: EventKind,
  cb: NotifyCallback,
}

/// Per-socket event state: callback registrations, edge tracking, and the
/// lazily created readiness descriptors.
pub(crate) struct EventState {
  entries: Mutex<Vec<NotifyEntry>>,
  next_id: AtomicU64,
  send_ready: AtomicBool,
  recv_ready: AtomicBool,
  closed: AtomicBool,
  #[cfg(unix)]
  send_fd: Mutex<Option<NotifyFd>>,
  #[cfg(unix)]
  recv_fd: Mutex<Option<NotifyFd>>,
}

impl EventState {
  pub(crate) fn new() -> Self {
    Self {
      entries: Mutex::new(Vec::new()),
      next_id: AtomicU64::new(1),
      send_ready: AtomicBool::new(true),
      recv_ready: AtomicBool::new(false),
      closed: AtomicBool::new(false),
      #[cfg(unix)]
      send_fd: Mutex::new(None),
      #[cfg(unix)]
      recv_fd: Mutex::new(None),
    }
  }

  fn level(&self, kind: EventKind) -> &AtomicBool {
    match kind {
      EventKind::SendReady => &self.send_ready,
      EventKind::RecvReady => &self.recv_ready,
    }
  }

  /// Records the current readiness level for `kind` and fires callbacks
  /// and descriptor signals on the rising edge.
  pub(crate) fn update(&self, kind: EventKind, ready: bool) {
    if self.closed.load(Ordering::Acquire) {
      return;
    }
    let level = self.level(kind);
    if !ready {
      level.store(false, Ordering::Release);
      return;
    }
    if level.swap(true, Ordering::AcqRel) {
      return; // no edge
    }
    let cbs: Vec<NotifyCallback> = {
      let entries = self.entries.lock();
      entries.iter().filter(|e| e.kind == kind).map(|e| e.cb.clone()).collect()
    };
    for cb in cbs {
      cb(kind);
    }
    #[cfg(unix)]
    {
      let fd_slot = match kind {
        EventKind::SendReady => &self.send_fd,
        EventKind::RecvReady => &self.recv_fd,
      };
      if let Some(fd) = fd_slot.lock().as_ref() {
        fd.signal();
      }
    }
  }

  /// Registers a callback. `ready_now` reflects the current queue level;
  /// a registrant on an already-ready socket is signaled immediately so it
  /// never misses the edge that happened before it subscribed.
  pub(crate) fn add(&self, kind: EventKind, cb: NotifyCallback, ready_now: bool) -> NotifyHandle {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    self.entries.lock().push(NotifyEntry { id, kind, cb: cb.clone() });
    if ready_now {
      self.level(kind).store(true, Ordering::Release);
      cb(kind);
    }
    NotifyHandle { id }
  }

  pub(crate) fn remove(&self, handle: NotifyHandle) {
    self.entries.lock().retain(|e| e.id != handle.id);
  }

  /// Returns (creating on first use) the readiness descriptor for `kind`.
  /// The returned descriptor is owned by the socket and closed with it.
  #[cfg(unix)]
  pub(crate) fn notify_fd(&self, kind: EventKind, ready_now: bool) -> Result<RawFd, NmqError> {
    if self.closed.load(Ordering::Acquire) {
      return Err(NmqError::Closed);
    }
    let slot = match kind {
      EventKind::SendReady => &self.send_fd,
      EventKind::RecvReady => &self.recv_fd,
    };
    let mut guard = slot.lock();
    if guard.is_none() {
      let fd = NotifyFd::new()?;
      if ready_now {
        fd.signal();
      }
      *guard = Some(fd);
    }
    Ok(guard.as_ref().map(|fd| fd.read_fd()).unwrap_or(-1))
  }

  /// Drops registrations and descriptors; called once during socket close.
  pub(crate) fn close(&self) {
    self.closed.store(true, Ordering::Release);
    self.entries.lock().clear();
    #[cfg(unix)]
    {
      self.send_fd.lock().take();
      self.recv_fd.lock().take();
    }
  }
}

/// Self-pipe backing one readiness descriptor. A byte is written on each
/// rising edge; consumers drain the read end after polling it.
#[cfg(unix)]
struct NotifyFd {
  r: RawFd,
  w: RawFd,
}

#[cfg(unix)]
impl NotifyFd {
  fn new() -> Result<Self, NmqError> {
    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc != 0 {
      return Err(NmqError::Io(std::io::Error::last_os_error()));
    }
    for fd in fds {
      unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
      }
    }
    Ok(Self { r: fds[0], w: fds[1] })
  }

  fn read_fd(&self) -> RawFd {
    self.r
  }

  fn signal(&self) {
    let byte = 1u8;
    // EAGAIN just means the pipe already holds unconsumed edges
    unsafe {
      libc::write(self.w, &byte as *const u8 as *const libc::c_void, 1);
    }
  }
}

#[cfg(unix)]
impl Drop for NotifyFd {
  fn drop(&mut self) {
    unsafe {
      libc::close(self.r);
      libc::close(self.w);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;

  #[test]
  fn callbacks_fire_on_rising_edges_only() {
    let ev = EventState::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    ev.add(
      EventKind::RecvReady,
      Arc::new(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
      }),
      false,
    );
    ev.update(EventKind::RecvReady, true);
    ev.update(EventKind::RecvReady, true); // level, not edge
    ev.update(EventKind::RecvReady, false);
    ev.update(EventKind::RecvReady, true);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn unnotify_stops_delivery() {
    let ev = EventState::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let handle = ev.add(
      EventKind::SendReady,
      Arc::new(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
      }),
      false,
    );
    ev.update(EventKind::SendReady, true);
    ev.remove(handle);
    ev.update(EventKind::SendReady, false);
    ev.update(EventKind::SendReady, true);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[cfg(unix)]
  #[test]
  fn notify_fd_signals_edges() {
    let ev = EventState::new();
    let fd = ev.notify_fd(EventKind::RecvReady, false).unwrap();
    ev.update(EventKind::RecvReady, true);
    let mut buf = [0u8; 8];
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    assert!(n >= 1);
  }
}
