// src/queue.rs

//! Bounded, closable message queue.
//!
//! One instance connects the application side of a socket to its protocol
//! side in each direction (the upper write and upper read queues), and the
//! in-process transport reuses it as the pipe fabric. Ordering is strictly
//! FIFO and capacity is fixed at creation. Closing a queue unblocks every
//! parked caller with [`NmqError::Closed`] exactly once; a closed queue is
//! never reused.

use crate::error::NmqError;
use crate::message::Msg;

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Absolute time limit for a blocking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
  /// Probe once; fail with [`NmqError::WouldBlock`] instead of parking.
  Zero,
  /// Park until the given instant, then fail with [`NmqError::TimedOut`].
  At(Instant),
  /// Park until the operation completes or the socket closes.
  Infinite,
}

impl Deadline {
  /// Builds a deadline `timeout` from now. `None` means wait forever,
  /// `Some(Duration::ZERO)` means do not wait at all.
  pub fn after(timeout: Option<Duration>) -> Self {
    match timeout {
      None => Deadline::Infinite,
      Some(d) if d.is_zero() => Deadline::Zero,
      Some(d) => Deadline::At(Instant::now() + d),
    }
  }
}

/// Readiness watcher installed by the socket's event state.
///
/// Invoked with the queue's `(readable, writable)` snapshot after any
/// transition of either flag, with no queue lock held.
pub(crate) type QueueWatcher = Arc<dyn Fn(bool, bool) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
  Open,
  /// Writers are refused, readers may empty what is queued.
  Draining,
  Closed,
}

struct Inner {
  q: VecDeque<Msg>,
  state: QueueState,
  watcher: Option<QueueWatcher>,
  reported_readable: bool,
  reported_writable: bool,
}

impl Inner {
  fn readable(&self) -> bool {
    self.state != QueueState::Closed && !self.q.is_empty()
  }

  fn writable(&self, cap: usize) -> bool {
    self.state == QueueState::Open && self.q.len() < cap
  }

  /// Records the current readiness snapshot and returns the watcher to
  /// invoke if either flag changed since it was last reported.
  fn signal(&mut self, cap: usize) -> Option<(QueueWatcher, bool, bool)> {
    let readable = self.readable();
    let writable = self.writable(cap);
    if readable == self.reported_readable && writable == self.reported_writable {
      return None;
    }
    self.reported_readable = readable;
    self.reported_writable = writable;
    self.watcher.clone().map(|w| (w, readable, writable))
  }
}

/// Bounded FIFO hand-off queue with blocking put/get and explicit closure.
pub struct MsgQueue {
  cap: usize,
  inner: Mutex<Inner>,
  /// Wakes getters when a message arrives or the queue closes.
  notempty: Condvar,
  /// Wakes putters when space frees, and the drainer as the queue empties.
  notfull: Condvar,
}

impl MsgQueue {
  /// Creates a queue holding at most `cap` messages. Capacity is clamped
  /// to at least one slot.
  pub fn new(cap: usize) -> Arc<Self> {
    Arc::new(Self {
      cap: cap.max(1),
      inner: Mutex::new(Inner {
        q: VecDeque::new(),
        state: QueueState::Open,
        watcher: None,
        reported_readable: false,
        reported_writable: true,
      }),
      notempty: Condvar::new(),
      notfull: Condvar::new(),
    })
  }

  pub fn capacity(&self) -> usize {
    self.cap
  }

  pub fn len(&self) -> usize {
    self.inner.lock().q.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_closed(&self) -> bool {
    self.inner.lock().state == QueueState::Closed
  }

  pub(crate) fn is_readable(&self) -> bool {
    self.inner.lock().readable()
  }

  pub(crate) fn is_writable(&self) -> bool {
    let inner = self.inner.lock();
    inner.writable(self.cap)
  }

  /// Installs the readiness watcher. At most one watcher is supported; it
  /// is installed once, before the queue carries traffic.
  pub(crate) fn set_watcher(&self, watcher: QueueWatcher) {
    self.inner.lock().watcher = Some(watcher);
  }

  /// Enqueues a message, parking until space is available or `deadline`
  /// passes. A refused message is dropped with the error.
  pub fn put(&self, msg: Msg, deadline: Deadline) -> Result<(), NmqError> {
    let mut inner = self.inner.lock();
    loop {
      if inner.state != QueueState::Open {
        return Err(NmqError::Closed);
      }
      if inner.q.len() < self.cap {
        inner.q.push_back(msg);
        self.notempty.notify_one();
        let ev = inner.signal(self.cap);
        drop(inner);
        dispatch(ev);
        return Ok(());
      }
      match deadline {
        Deadline::Zero => return Err(NmqError::WouldBlock),
        Deadline::Infinite => self.notfull.wait(&mut inner),
        Deadline::At(t) => {
          let timed_out = self.notfull.wait_until(&mut inner, t).timed_out();
          if timed_out && inner.state == QueueState::Open && inner.q.len() >= self.cap {
            return Err(NmqError::TimedOut);
          }
        }
      }
    }
  }

  /// Dequeues the oldest message, parking until one is available or
  /// `deadline` passes.
  pub fn get(&self, deadline: Deadline) -> Result<Msg, NmqError> {
    let mut inner = self.inner.lock();
    loop {
      if let Some(msg) = inner.q.pop_front() {
        self.notfull.notify_one();
        if inner.state == QueueState::Draining && inner.q.is_empty() {
          // let the drainer observe the empty queue promptly
          self.notfull.notify_all();
        }
        let ev = inner.signal(self.cap);
        drop(inner);
        dispatch(ev);
        return Ok(msg);
      }
      match inner.state {
        QueueState::Closed => return Err(NmqError::Closed),
        QueueState::Draining => {
          // drained dry; finish the close on behalf of the drainer
          inner.state = QueueState::Closed;
          self.notempty.notify_all();
          self.notfull.notify_all();
          let ev = inner.signal(self.cap);
          drop(inner);
          dispatch(ev);
          return Err(NmqError::Closed);
        }
        QueueState::Open => {}
      }
      match deadline {
        Deadline::Zero => return Err(NmqError::WouldBlock),
        Deadline::Infinite => self.notempty.wait(&mut inner),
        Deadline::At(t) => {
          let timed_out = self.notempty.wait_until(&mut inner, t).timed_out();
          if timed_out && inner.state == QueueState::Open && inner.q.is_empty() {
            return Err(NmqError::TimedOut);
          }
        }
      }
    }
  }

  /// Returns a message to the head of the queue, preserving FIFO order
  /// for a consumer undoing its last take (e.g. a protocol worker whose
  /// pipe vanished between dequeue and transmit). Accepts even at
  /// capacity so the undo always fits; fails only on a closed queue.
  pub fn put_back(&self, msg: Msg) -> Result<(), NmqError> {
    let mut inner = self.inner.lock();
    if inner.state == QueueState::Closed {
      return Err(NmqError::Closed);
    }
    inner.q.push_front(msg);
    self.notempty.notify_one();
    let ev = inner.signal(self.cap);
    drop(inner);
    dispatch(ev);
    Ok(())
  }

  /// Stops writers immediately and lets readers empty the queue until
  /// `deadline`, then closes it fully. Used by graceful socket close to
  /// honor the linger interval.
  pub fn drain(&self, deadline: Deadline) {
    let mut inner = self.inner.lock();
    if inner.state == QueueState::Closed {
      return;
    }
    inner.state = QueueState::Draining;
    // parked writers wake and observe closure
    self.notfull.notify_all();
    if let Some(ev) = inner.signal(self.cap) {
      // report the writability loss before parking on the drain
      parking_lot::MutexGuard::unlocked(&mut inner, || dispatch(Some(ev)));
    }
    loop {
      if inner.state == QueueState::Closed || inner.q.is_empty() {
        break;
      }
      match deadline {
        Deadline::Zero => break,
        Deadline::Infinite => self.notfull.wait(&mut inner),
        Deadline::At(t) => {
          if self.notfull.wait_until(&mut inner, t).timed_out() {
            break;
          }
        }
      }
    }
    inner.state = QueueState::Closed;
    inner.q.clear();
    self.notempty.notify_all();
    self.notfull.notify_all();
    let ev = inner.signal(self.cap);
    drop(inner);
    dispatch(ev);
  }

  /// Closes the queue immediately, discarding queued messages and waking
  /// every parked caller with [`NmqError::Closed`].
  pub fn close(&self) {
    let mut inner = self.inner.lock();
    if inner.state == QueueState::Closed {
      return;
    }
    inner.state = QueueState::Closed;
    inner.q.clear();
    self.notempty.notify_all();
    self.notfull.notify_all();
    let ev = inner.signal(self.cap);
    drop(inner);
    dispatch(ev);
  }
}

fn dispatch(ev: Option<(QueueWatcher, bool, bool)>) {
  if let Some((watcher, readable, writable)) = ev {
    watcher(readable, writable);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::thread;

  #[test]
  fn fifo_order_preserved() {
    let q = MsgQueue::new(8);
    for i in 0..5u8 {
      q.put(Msg::from_vec(vec![i]), Deadline::Zero).unwrap();
    }
    for i in 0..5u8 {
      let m = q.get(Deadline::Zero).unwrap();
      assert_eq!(m.data(), &[i]);
    }
  }

  #[test]
  fn zero_deadline_probes() {
    let q = MsgQueue::new(1);
    assert!(matches!(q.get(Deadline::Zero), Err(NmqError::WouldBlock)));
    q.put(Msg::new(), Deadline::Zero).unwrap();
    assert!(matches!(
      q.put(Msg::new(), Deadline::Zero),
      Err(NmqError::WouldBlock)
    ));
  }

  #[test]
  fn timed_get_expires() {
    let q = MsgQueue::new(1);
    let start = Instant::now();
    let deadline = Deadline::At(start + Duration::from_millis(50));
    assert!(matches!(q.get(deadline), Err(NmqError::TimedOut)));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(5));
  }

  #[test]
  fn close_unblocks_all_waiters_once() {
    let q = MsgQueue::new(1);
    let closed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..4 {
      let q = q.clone();
      let closed = closed.clone();
      handles.push(thread::spawn(move || {
        match q.get(Deadline::Infinite) {
          Err(NmqError::Closed) => {
            closed.fetch_add(1, Ordering::SeqCst);
          }
          other => panic!("expected Closed, got {:?}", other.map(|m| m.size())),
        }
      }));
    }
    thread::sleep(Duration::from_millis(50));
    q.close();
    for h in handles {
      h.join().unwrap();
    }
    assert_eq!(closed.load(Ordering::SeqCst), 4);
    // closed queues never accept traffic again
    assert!(matches!(
      q.put(Msg::new(), Deadline::Infinite),
      Err(NmqError::Closed)
    ));
  }

  #[test]
  fn put_back_restores_head_position() {
    let q = MsgQueue::new(2);
    q.put(Msg::from_vec(vec![1]), Deadline::Zero).unwrap();
    q.put(Msg::from_vec(vec![2]), Deadline::Zero).unwrap();
    let first = q.get(Deadline::Zero).unwrap();
    // undo the take; order must be as if it never happened
    q.put_back(first).unwrap();
    assert_eq!(q.get(Deadline::Zero).unwrap().data(), &[1]);
    assert_eq!(q.get(Deadline::Zero).unwrap().data(), &[2]);
  }

  #[test]
  fn drain_lets_reader_empty_queue() {
    let q = MsgQueue::new(4);
    for i in 0..3u8 {
      q.put(Msg::from_vec(vec![i]), Deadline::Zero).unwrap();
    }
    let reader = {
      let q = q.clone();
      thread::spawn(move || {
        let mut got = Vec::new();
        loop {
          match q.get(Deadline::Infinite) {
            Ok(m) => got.push(m.data()[0]),
            Err(NmqError::Closed) => break,
            Err(e) => panic!("unexpected error: {e}"),
          }
        }
        got
      })
    };
    q.drain(Deadline::At(Instant::now() + Duration::from_secs(2)));
    assert!(q.is_closed());
    let got = reader.join().unwrap();
    assert_eq!(got, vec![0, 1, 2]);
  }

  #[test]
  fn drain_deadline_discards_leftovers() {
    let q = MsgQueue::new(4);
    q.put(Msg::new(), Deadline::Zero).unwrap();
    // nobody reads; the drain must give up at the deadline
    let start = Instant::now();
    q.drain(Deadline::At(start + Duration::from_millis(50)));
    assert!(q.is_closed());
    assert_eq!(q.len(), 0);
  }

  #[test]
  fn watcher_sees_edges() {
    let q = MsgQueue::new(1);
    let readable_edges = Arc::new(AtomicUsize::new(0));
    let edges = readable_edges.clone();
    let prev_cell = Arc::new(Mutex::new(false));
    q.set_watcher(Arc::new(move |readable, _writable| {
      let mut prev = prev_cell.lock();
      if readable && !*prev {
        edges.fetch_add(1, Ordering::SeqCst);
      }
      *prev = readable;
    }));
    q.put(Msg::new(), Deadline::Zero).unwrap();
    let _ = q.get(Deadline::Zero).unwrap();
    q.put(Msg::new(), Deadline::Zero).unwrap();
    assert_eq!(readable_edges.load(Ordering::SeqCst), 2);
  }
}
