//! Wire-level errors: framing and codec failures.

use thiserror::Error;

/// Errors that can occur while framing or decoding wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Stream ended before a full 4-byte length header was read.
    #[error("truncated frame header: got {got} of 4 bytes")]
    TruncatedHeader {
        /// Bytes actually read before EOF.
        got: usize,
    },

    /// Declared frame body length exceeds [`crate::frame::MAX_FRAME_BYTES`].
    #[error("frame too large: declared {declared} bytes, max {max}")]
    FrameTooLarge {
        /// Declared length from the frame header.
        declared: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Stream ended before the declared body length was fully read.
    #[error("truncated frame body: expected {expected} bytes, got {got}")]
    TruncatedBody {
        /// Declared body length.
        expected: u32,
        /// Bytes actually read before EOF.
        got: usize,
    },

    /// CBOR decode of an otherwise well-framed payload failed.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl ProtocolError {
    /// Whether retrying on a fresh connection could plausibly succeed.
    ///
    /// All protocol errors here reflect either a transport hiccup
    /// (truncation) or a genuine wire-format violation (oversized/malformed);
    /// none of them are meaningful to retry on the *same* connection, but a
    /// caller higher up the stack may still choose to reconnect.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TruncatedHeader { .. } | Self::TruncatedBody { .. })
    }
}
