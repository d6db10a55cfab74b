//! Wire types for the editor IPC bridge: framing, envelopes, control
//! messages, and the schema digest.
//!
//! This crate is a pure function of bytes — it performs no I/O and knows
//! nothing about sockets, threads, or the Editor. `ipc-bridge-core` builds
//! the connection state machine on top of these types; `ipc-bridge-server`
//! drives real sockets.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod control;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod schema;

pub use control::{Control, Hello, Reject, RejectCode, Welcome, MAX_CORRELATION_LEN};
pub use envelope::{Envelope, Event, EventKind, LogLevel, Request, Response};
pub use error::ProtocolError;
pub use frame::MAX_FRAME_BYTES;
pub use schema::SCHEMA_DIGEST;
