//! Editor-side IPC bridge server: the TCP loopback listener, per-connection
//! handshake and dispatch loop, the Event Publisher, and the two reference
//! Sub-Handlers (`health`, `diagnostics`).
//!
//! `ipc-bridge-core` provides the pure connection state machine this crate
//! drives with real sockets; see [`listener::run`] for the entry point a
//! hosting process (or the bundled demo binary) calls to start serving.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod listener;
pub mod publisher;
pub mod registry;
pub mod subhandler;

pub use driver::{ConnectionAction, ConnectionDriver, ConnectionEvent};
pub use error::BridgeError;
pub use publisher::{EventPublisher, EVENT_QUEUE_SOFT_MAX, PUMP_INTERVAL_MS};
pub use registry::ConnectionRegistry;
pub use subhandler::{SubHandler, SubHandlerRegistry};
