//! Connection-layer errors: handshake and state-machine failures.

use thiserror::Error;

/// Errors produced by the connection state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// An envelope was received while the connection was not `Active`, or a
    /// control message while it was not `AwaitingHello`.
    #[error("invalid state for operation: state={state}, operation={operation}")]
    InvalidState {
        /// Connection state at the time of the operation.
        state: &'static str,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// No `Hello` frame arrived within the handshake budget.
    #[error("handshake timed out after {elapsed_ms}ms")]
    HandshakeTimeout {
        /// Elapsed time in milliseconds.
        elapsed_ms: u64,
    },

    /// Underlying wire-level decode failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ipc_bridge_proto::ProtocolError),
}

impl ConnectionError {
    /// Whether a caller could plausibly retry by reconnecting.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HandshakeTimeout { .. } => true,
            Self::InvalidState { .. } | Self::Protocol(_) => false,
        }
    }
}
