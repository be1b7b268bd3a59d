// src/message/msg.rs

use bytes::Bytes;
use std::fmt;

/// A single opaque message.
///
/// The core never inspects the payload; it only accounts for its size.
/// Ownership transfers whole on every enqueue and dequeue, so at any
/// instant a message has exactly one owner: a queue, a sender, or a
/// receiver. Cloning is cheap (`Bytes` is reference counted) but the core
/// itself never clones payloads.
#[derive(Clone, Default)]
pub struct Msg {
  data: Bytes,
}

impl Msg {
  /// Creates an empty message.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a message from a `Vec<u8>`, taking ownership.
  pub fn from_vec(data: Vec<u8>) -> Self {
    Self { data: Bytes::from(data) }
  }

  /// Creates a message from `bytes::Bytes`.
  pub fn from_bytes(data: Bytes) -> Self {
    Self { data }
  }

  /// Creates a message from a static byte slice (zero-copy).
  pub fn from_static(data: &'static [u8]) -> Self {
    Self {
      data: Bytes::from_static(data),
    }
  }

  /// Returns the message payload bytes.
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// Returns the size of the payload in bytes.
  pub fn size(&self) -> usize {
    self.data.len()
  }

  /// Consumes the message and returns the underlying buffer.
  pub fn into_bytes(self) -> Bytes {
    self.data
  }
}

impl From<Vec<u8>> for Msg {
  fn from(data: Vec<u8>) -> Self {
    Msg::from_vec(data)
  }
}

impl From<Bytes> for Msg {
  fn from(data: Bytes) -> Self {
    Msg::from_bytes(data)
  }
}

impl fmt::Debug for Msg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Msg").field("size", &self.size()).finish()
  }
}
