// src/socket/mod.rs

//! Socket core: lifecycle, upper queues, pipe and endpoint registration,
//! options, and readiness events.

pub mod core;
pub mod events;
pub mod options;
pub mod pipe;
pub(crate) mod registry;
pub mod types;

pub use self::core::{SockState, SocketCore};
pub use self::events::{EventKind, NotifyCallback, NotifyHandle};
pub use self::pipe::{IPipeTransport, Pipe, PipeList};
pub use self::types::{Socket, ToBytes};
