// src/error.rs

//! The crate's single public error enum.
//!
//! `NmqError` follows the teacher crate's `ZmqError`: one
//! `#[non_exhaustive]` `thiserror` enum with `#[from] io::Error` and a
//! mapping to the POSIX-style integer codes the original nanomsg family
//! surfaced (`libc` constants). See SPEC_FULL.md §7 for the taxonomy.

use std::io;
use thiserror::Error;

/// Errors returned across the rnmq public surface.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NmqError {
  /// Underlying I/O failure.
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  /// The socket or its queue is closing/closed.
  #[error("socket is closed")]
  Closed,

  /// A deadline elapsed while blocked.
  #[error("operation timed out")]
  TimedOut,

  /// A zero-wait operation found the queue full (send) or empty (receive).
  #[error("operation would block")]
  WouldBlock,

  /// `hold` on an unknown or destroyed socket id.
  #[error("socket not found")]
  NotFound,

  /// The operation is not supported in the current direction/state
  /// (synthetic direction errors).
  #[error("operation not supported")]
  NotSupported,

  /// A received message exceeded the configured size limit.
  #[error("message exceeds the receive-size limit")]
  MessageTooLarge,

  /// No such protocol is registered.
  #[error("invalid or unregistered protocol: {0}")]
  InvalidProtocol(u16),

  /// Unknown socket option id.
  #[error("invalid socket option id: {0}")]
  InvalidOption(i32),

  /// The supplied option value had the wrong size.
  #[error("invalid size for socket option id {0}")]
  InvalidOptionSize(i32),

  /// The supplied option value was out of range or malformed.
  #[error("invalid value for socket option id {0}")]
  InvalidOptionValue(i32),

  /// Endpoint address already in use.
  #[error("address already in use: {0}")]
  AddrInUse(String),

  /// Synchronous dial was refused by the peer.
  #[error("connection refused: {0}")]
  ConnectionRefused(String),

  /// Endpoint string could not be parsed.
  #[error("invalid endpoint format: {0}")]
  InvalidEndpoint(String),

  /// Transport scheme not supported or not enabled.
  #[error("transport scheme not supported: {0}")]
  UnsupportedTransport(String),

  /// Other synthetic protocol error carrying a raw integer code.
  #[error("protocol error (code {0})")]
  Protocol(i32),

  /// Internal invariant violation.
  #[error("internal error: {0}")]
  Internal(String),
}

impl NmqError {
  /// Maps this error to the POSIX-style integer code callers observe,
  /// mirroring the `errno` values the original C family surfaced.
  pub fn code(&self) -> i32 {
    match self {
      NmqError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
      NmqError::Closed => libc::EPIPE,
      NmqError::TimedOut => libc::ETIMEDOUT,
      NmqError::WouldBlock => libc::EAGAIN,
      NmqError::NotFound => libc::ENOENT,
      NmqError::NotSupported => libc::ENOTSUP,
      NmqError::MessageTooLarge => libc::EMSGSIZE,
      NmqError::InvalidProtocol(_) => libc::EPROTONOSUPPORT,
      NmqError::InvalidOption(_) => libc::EINVAL,
      NmqError::InvalidOptionSize(_) => libc::EINVAL,
      NmqError::InvalidOptionValue(_) => libc::EINVAL,
      NmqError::AddrInUse(_) => libc::EADDRINUSE,
      NmqError::ConnectionRefused(_) => libc::ECONNREFUSED,
      NmqError::InvalidEndpoint(_) => libc::EINVAL,
      NmqError::UnsupportedTransport(_) => libc::EPROTONOSUPPORT,
      NmqError::Protocol(code) => *code,
      NmqError::Internal(_) => libc::EFAULT,
    }
  }

  /// Rebuilds an error from a synthetic integer code consulted by protocol
  /// state machines (`set_send_error`/`set_recv_error`). Codes without a
  /// dedicated variant are preserved as [`NmqError::Protocol`].
  pub fn from_code(code: i32) -> Self {
    match code {
      libc::EAGAIN => NmqError::WouldBlock,
      libc::ETIMEDOUT => NmqError::TimedOut,
      libc::EPIPE => NmqError::Closed,
      libc::ENOTSUP => NmqError::NotSupported,
      libc::EMSGSIZE => NmqError::MessageTooLarge,
      other => NmqError::Protocol(other),
    }
  }
}
