// src/message/mod.rs

//! Opaque message representation flowing through socket queues and pipes.

mod msg;

pub use msg::Msg;
