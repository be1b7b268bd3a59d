// tests/options.rs

use rnmq::protocol::ids;
use rnmq::socket::options::{
  BESTEFFORT, LINGER, PROTOCOL, RCVMAXSZ, RCVTIMEO, RECONNECT_IVL, RECONNECT_IVL_MAX, SNDTIMEO,
};
use rnmq::{NmqError, Socket};

mod common;

fn i32_of(bytes: &[u8]) -> i32 {
  i32::from_ne_bytes(bytes.try_into().expect("i32-sized option value"))
}

fn usize_of(bytes: &[u8]) -> usize {
  usize::from_ne_bytes(bytes.try_into().expect("usize-sized option value"))
}

#[test]
fn every_duration_option_round_trips() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  for option in [LINGER, SNDTIMEO, RCVTIMEO] {
    for value in [-1i32, 0, 1, 250, 60_000] {
      sock.set_option(option, value).unwrap();
      assert_eq!(
        i32_of(&sock.get_option(option).unwrap()),
        value,
        "option {option} did not round-trip {value}"
      );
    }
  }
  for (option, values) in [
    (RECONNECT_IVL, vec![1i32, 100, 5_000]),
    (RECONNECT_IVL_MAX, vec![0i32, 100, 30_000]),
  ] {
    for value in values {
      sock.set_option(option, value).unwrap();
      assert_eq!(i32_of(&sock.get_option(option).unwrap()), value);
    }
  }
  sock.close();
}

#[test]
fn size_and_flag_options_round_trip() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();

  for value in [0usize, 16, 1024 * 1024, usize::MAX / 2] {
    sock.set_option(RCVMAXSZ, value).unwrap();
    assert_eq!(usize_of(&sock.get_option(RCVMAXSZ).unwrap()), value);
  }

  sock.set_option(BESTEFFORT, true).unwrap();
  assert_eq!(i32_of(&sock.get_option(BESTEFFORT).unwrap()), 1);
  sock.set_option(BESTEFFORT, false).unwrap();
  assert_eq!(i32_of(&sock.get_option(BESTEFFORT).unwrap()), 0);

  sock.close();
}

#[test]
fn wrong_sized_values_are_rejected() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  assert!(matches!(
    sock.set_option_raw(LINGER, &[0u8; 2]),
    Err(NmqError::InvalidOptionSize(LINGER))
  ));
  assert!(matches!(
    sock.set_option_raw(RCVMAXSZ, &[0u8; 4]),
    Err(NmqError::InvalidOptionSize(RCVMAXSZ))
  ));
  // an i32 where a usize is expected must not be guessed at
  assert!(matches!(
    sock.set_option(RCVMAXSZ, 16i32),
    Err(NmqError::InvalidOptionSize(RCVMAXSZ))
  ));
  sock.close();
}

#[test]
fn invalid_ids_and_values_are_rejected() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  assert!(matches!(
    sock.set_option(9999, 1i32),
    Err(NmqError::InvalidOption(9999))
  ));
  assert!(matches!(
    sock.get_option(9999),
    Err(NmqError::InvalidOption(9999))
  ));
  assert!(matches!(
    sock.set_option(SNDTIMEO, -2i32),
    Err(NmqError::InvalidOptionValue(SNDTIMEO))
  ));
  assert!(matches!(
    sock.set_option(RECONNECT_IVL, 0i32),
    Err(NmqError::InvalidOptionValue(RECONNECT_IVL))
  ));
  assert!(matches!(
    sock.set_option(BESTEFFORT, 3i32),
    Err(NmqError::InvalidOptionValue(BESTEFFORT))
  ));
  sock.close();
}

#[test]
fn protocol_option_reads_back_the_protocol() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  assert_eq!(i32_of(&sock.get_option(PROTOCOL).unwrap()), ids::PAIR as i32);
  // the protocol number is not writable
  assert!(matches!(
    sock.set_option(PROTOCOL, 0i32),
    Err(NmqError::InvalidOption(PROTOCOL))
  ));
  sock.close();
}

#[test]
fn options_are_refused_once_closing() {
  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  sock.close();
  assert!(matches!(
    sock.set_option(LINGER, 10i32),
    Err(NmqError::Closed)
  ));
}

#[cfg(unix)]
#[test]
fn readiness_descriptors_are_issued() {
  use rnmq::socket::options::{RCVFD, SNDFD};

  common::init_tracing();
  let sock = Socket::open(ids::PAIR).unwrap();
  let sndfd = i32_of(&sock.get_option(SNDFD).unwrap());
  let rcvfd = i32_of(&sock.get_option(RCVFD).unwrap());
  assert!(sndfd >= 0);
  assert!(rcvfd >= 0);
  assert_ne!(sndfd, rcvfd);
  // asking again returns the same descriptor, not a fresh pipe
  assert_eq!(i32_of(&sock.get_option(SNDFD).unwrap()), sndfd);
  sock.close();
}
