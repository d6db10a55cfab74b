//! Top-level server errors.

use thiserror::Error;

/// Errors produced while running the bridge server.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Failed to bind the loopback listener.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Underlying connection state-machine error.
    #[error("connection error: {0}")]
    Connection(#[from] ipc_bridge_core::ConnectionError),
}
