// tests/lifecycle.rs

use rnmq::protocol::ids;
use rnmq::{Deadline, Msg, NmqError, Socket};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod common;

#[test]
fn open_close_and_hold() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).expect("open pair socket");
  let id = sock.id();
  assert_eq!(sock.proto(), ids::PAIR);
  assert_eq!(sock.peer(), ids::PAIR);

  let held = Socket::hold(id).expect("hold open socket");
  assert_eq!(held.id(), id);

  sock.close();
  assert!(matches!(Socket::hold(id), Err(NmqError::NotFound)));

  // a handle held across the close still answers accessors but refuses
  // traffic
  assert!(matches!(held.send(Msg::new()), Err(NmqError::Closed)));
  assert!(matches!(held.recv(), Err(NmqError::Closed)));
}

#[test]
fn close_is_idempotent_across_threads() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  let mut handles = Vec::new();
  for _ in 0..4 {
    let sock = sock.clone();
    handles.push(thread::spawn(move || sock.close()));
  }
  sock.close();
  for h in handles {
    h.join().unwrap();
  }
}

#[test]
fn close_unblocks_every_blocked_receiver() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  let closed = Arc::new(AtomicUsize::new(0));
  let mut handles = Vec::new();
  for _ in 0..5 {
    let sock = sock.clone();
    let closed = closed.clone();
    handles.push(thread::spawn(move || {
      match sock.recv_msg(Deadline::Infinite) {
        Err(NmqError::Closed) => {
          closed.fetch_add(1, Ordering::SeqCst);
        }
        other => panic!("expected Closed, got {:?}", other),
      }
    }));
  }
  // give the receivers time to park
  thread::sleep(Duration::from_millis(100));

  let start = Instant::now();
  sock.close();
  for h in handles {
    h.join().unwrap();
  }
  assert_eq!(closed.load(Ordering::SeqCst), 5);
  assert!(start.elapsed() < Duration::from_secs(5), "close took too long to unblock receivers");
}

#[test]
fn shutdown_fails_blocked_sender() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  // no pipe drains the write queue; fill it completely
  loop {
    match sock.send_msg(Msg::from_static(b"fill"), Deadline::Zero) {
      Ok(()) => {}
      Err(NmqError::WouldBlock) => break,
      Err(e) => panic!("unexpected error while filling queue: {e}"),
    }
  }
  let blocked = {
    let sock = sock.clone();
    thread::spawn(move || sock.send_msg(Msg::from_static(b"overflow"), Deadline::Infinite))
  };
  thread::sleep(Duration::from_millis(100));
  sock.shutdown();
  assert!(matches!(blocked.join().unwrap(), Err(NmqError::Closed)));
}

#[test]
fn send_timeout_expires_on_schedule() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  loop {
    match sock.send_msg(Msg::from_static(b"fill"), Deadline::Zero) {
      Ok(()) => {}
      Err(NmqError::WouldBlock) => break,
      Err(e) => panic!("unexpected error while filling queue: {e}"),
    }
  }
  let timeout = Duration::from_millis(50);
  let start = Instant::now();
  let result = sock.send_msg(
    Msg::from_static(b"late"),
    Deadline::At(start + timeout),
  );
  let elapsed = start.elapsed();
  assert!(matches!(result, Err(NmqError::TimedOut)));
  assert!(elapsed >= Duration::from_millis(45), "timed out early: {elapsed:?}");
  assert!(elapsed < Duration::from_secs(5), "timed out far too late: {elapsed:?}");
  sock.shutdown();
}

#[test]
fn linger_bounds_graceful_close() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  // queue a few messages nobody will ever drain
  for _ in 0..4 {
    sock.send_msg(Msg::from_static(b"stranded"), Deadline::Zero).unwrap();
  }
  sock
    .set_option(rnmq::socket::options::LINGER, 100i32)
    .unwrap();
  let start = Instant::now();
  sock.close();
  let elapsed = start.elapsed();
  assert!(elapsed >= Duration::from_millis(90), "close returned before linger: {elapsed:?}");
  assert!(elapsed < Duration::from_secs(5), "close overstayed linger: {elapsed:?}");
}
