// src/lib.rs

//! rnmq - a pure-Rust socket core for nanomsg-style scalability protocols.
//!
//! The crate provides the synchronization heart of a messaging library:
//! blocking send/receive with deadlines, graceful close with linger,
//! reference-counted lookup by socket id, and the registration surface
//! protocols and transports plug into. It implements no wire protocol and
//! performs no network I/O itself; the bundled `pair` protocol and
//! `inproc` transport exist so a socket pair is usable out of the box.

/// Defines custom error types used throughout the library.
pub mod error;
/// Contains the opaque message type.
pub mod message;
/// Protocol operation tables and the protocol registry.
pub mod protocol;
/// The bounded, closable message queue primitive.
pub mod queue;
/// Socket lifecycle, options, pipes, and readiness events.
pub mod socket;
/// Endpoint handling and the transport registry.
pub mod transport;

pub use error::NmqError;
pub use message::Msg;
pub use protocol::{IPipeOps, ISockOps, ProtocolDef};
pub use queue::{Deadline, MsgQueue};
pub use socket::{
  EventKind, IPipeTransport, NotifyCallback, NotifyHandle, Pipe, PipeList, SockState, Socket,
  SocketCore, ToBytes,
};
pub use transport::{Endpoint, EpFlags, EpKind, IEndpointTran, ITransport};

/// Major version number of the rnmq library.
const VERSION_MAJOR: i32 = 0;
/// Minor version number of the rnmq library.
const VERSION_MINOR: i32 = 1;
/// Patch version number of the rnmq library.
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}
