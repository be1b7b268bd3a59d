// src/socket/options.rs

use crate::error::NmqError;
use std::time::Duration;

// Option ids follow the numbering applications in this protocol family
// already use.
pub const LINGER: i32 = 1;
pub const SNDTIMEO: i32 = 4;
pub const RCVTIMEO: i32 = 5;
pub const RECONNECT_IVL: i32 = 6;
pub const RECONNECT_IVL_MAX: i32 = 7;
/// Read-only: readiness descriptor that becomes readable when the socket
/// can accept a send without blocking (Unix only).
pub const SNDFD: i32 = 10;
/// Read-only: readiness descriptor that becomes readable when a message is
/// waiting to be received (Unix only).
pub const RCVFD: i32 = 11;
/// Read-only: the protocol number the socket was opened with.
pub const PROTOCOL: i32 = 13;
pub const RCVMAXSZ: i32 = 16;
/// Send mode that drops rather than blocks when no capacity is available.
pub const BESTEFFORT: i32 = 18;

/// Depth of the upper write queue, fixed at socket creation.
pub(crate) const SENDQ_DEPTH: usize = 128;
/// Depth of the upper read queue, fixed at socket creation.
pub(crate) const RECVQ_DEPTH: usize = 128;

/// Holds parsed and validated socket options.
///
/// Timeouts and linger use `None` for infinite (the wire value -1) and
/// `Some(Duration::ZERO)` for an immediate, non-blocking attempt.
#[derive(Debug, Clone)]
pub(crate) struct SocketOptions {
  pub linger: Option<Duration>,
  pub sndtimeo: Option<Duration>,
  pub rcvtimeo: Option<Duration>,
  /// Initial redial interval after a pipe is lost.
  pub reconn_ivl: Duration,
  /// Backoff cap; `Duration::ZERO` disables backoff growth.
  pub reconn_ivl_max: Duration,
  /// Maximum accepted inbound message size in bytes; 0 means unlimited.
  pub rcvmaxsz: usize,
  pub best_effort: bool,
}

impl Default for SocketOptions {
  fn default() -> Self {
    Self {
      linger: Some(Duration::from_millis(1000)),
      sndtimeo: None,
      rcvtimeo: None,
      reconn_ivl: Duration::from_millis(100),
      reconn_ivl_max: Duration::ZERO,
      rcvmaxsz: 1024 * 1024,
      best_effort: false,
    }
  }
}

// --- Helper functions for parsing option values ---
//
// Option values travel as native-endian byte slices with an exact expected
// size; a mismatched size is an `InvalidOptionSize` error, never a best
// guess.

pub(crate) fn parse_i32_option(value: &[u8], option_id: i32) -> Result<i32, NmqError> {
  let arr: [u8; 4] = value
    .try_into()
    .map_err(|_| NmqError::InvalidOptionSize(option_id))?;
  Ok(i32::from_ne_bytes(arr))
}

pub(crate) fn parse_bool_option(value: &[u8], option_id: i32) -> Result<bool, NmqError> {
  match parse_i32_option(value, option_id)? {
    0 => Ok(false),
    1 => Ok(true),
    _ => Err(NmqError::InvalidOptionValue(option_id)),
  }
}

/// Parses a millisecond timeout/linger value: -1 infinite, 0 immediate,
/// positive a duration.
pub(crate) fn parse_timeout_option(value: &[u8], option_id: i32) -> Result<Option<Duration>, NmqError> {
  match parse_i32_option(value, option_id)? {
    -1 => Ok(None),
    ms @ 0.. => Ok(Some(Duration::from_millis(ms as u64))),
    _ => Err(NmqError::InvalidOptionValue(option_id)),
  }
}

/// Parses the initial reconnect interval; must be strictly positive.
pub(crate) fn parse_reconn_ivl_option(value: &[u8], option_id: i32) -> Result<Duration, NmqError> {
  match parse_i32_option(value, option_id)? {
    ms @ 1.. => Ok(Duration::from_millis(ms as u64)),
    _ => Err(NmqError::InvalidOptionValue(option_id)),
  }
}

/// Parses the reconnect backoff cap; 0 disables backoff growth.
pub(crate) fn parse_reconn_max_option(value: &[u8], option_id: i32) -> Result<Duration, NmqError> {
  match parse_i32_option(value, option_id)? {
    ms @ 0.. => Ok(Duration::from_millis(ms as u64)),
    _ => Err(NmqError::InvalidOptionValue(option_id)),
  }
}

/// Parses a size option carried as a native-endian `usize` (8 bytes on the
/// supported targets).
pub(crate) fn parse_size_option(value: &[u8], option_id: i32) -> Result<usize, NmqError> {
  let arr: [u8; std::mem::size_of::<usize>()] = value
    .try_into()
    .map_err(|_| NmqError::InvalidOptionSize(option_id))?;
  Ok(usize::from_ne_bytes(arr))
}

// --- Helpers for encoding option values for get_option ---

pub(crate) fn fmt_i32_option(v: i32) -> Vec<u8> {
  v.to_ne_bytes().to_vec()
}

pub(crate) fn fmt_timeout_option(v: Option<Duration>) -> Vec<u8> {
  let ms: i32 = match v {
    None => -1,
    Some(d) => d.as_millis().try_into().unwrap_or(i32::MAX),
  };
  fmt_i32_option(ms)
}

pub(crate) fn fmt_duration_option(v: Duration) -> Vec<u8> {
  let ms: i32 = v.as_millis().try_into().unwrap_or(i32::MAX);
  fmt_i32_option(ms)
}

pub(crate) fn fmt_size_option(v: usize) -> Vec<u8> {
  v.to_ne_bytes().to_vec()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timeout_parsing_maps_sentinels() {
    assert_eq!(parse_timeout_option(&(-1i32).to_ne_bytes(), SNDTIMEO).unwrap(), None);
    assert_eq!(
      parse_timeout_option(&0i32.to_ne_bytes(), SNDTIMEO).unwrap(),
      Some(Duration::ZERO)
    );
    assert_eq!(
      parse_timeout_option(&250i32.to_ne_bytes(), SNDTIMEO).unwrap(),
      Some(Duration::from_millis(250))
    );
    assert!(matches!(
      parse_timeout_option(&(-2i32).to_ne_bytes(), SNDTIMEO),
      Err(NmqError::InvalidOptionValue(SNDTIMEO))
    ));
  }

  #[test]
  fn wrong_size_is_rejected() {
    assert!(matches!(
      parse_i32_option(&[0u8; 2], LINGER),
      Err(NmqError::InvalidOptionSize(LINGER))
    ));
    assert!(matches!(
      parse_size_option(&[0u8; 4], RCVMAXSZ),
      Err(NmqError::InvalidOptionSize(RCVMAXSZ))
    ));
  }
}
