//! Length-delimited binary framing.
//!
//! A frame on the wire is `u32_be(len(payload)) || payload`. This module is a
//! pure function of bytes: it does no I/O and knows nothing about sockets,
//! only about the layout.
//!
//! # Invariants
//!
//! - `encode` never produces a frame whose body exceeds [`MAX_FRAME_BYTES`].
//! - `decode_header` never reports a length greater than [`MAX_FRAME_BYTES`];
//!   callers must treat a larger declared length as [`ProtocolError::FrameTooLarge`]
//!   and must not attempt to read that many bytes.

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// Maximum permitted frame body, in bytes (64 MiB).
pub const MAX_FRAME_BYTES: u32 = 67_108_864;

/// Number of bytes in the length prefix.
const HEADER_LEN: usize = 4;

/// Outcome of decoding a frame header out of a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDecode {
    /// Not enough bytes buffered yet; caller should read more and retry.
    Incomplete,
    /// A full header was present; `body_len` bytes of payload follow.
    Complete {
        /// Declared payload length.
        body_len: u32,
    },
}

/// Encode `payload` as a complete frame (`u32_be(len) || payload`) into `dst`.
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] if `payload.len()` exceeds
/// [`MAX_FRAME_BYTES`]; `dst` is left unmodified in that case.
pub fn encode(payload: &[u8], dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
        declared: u32::MAX,
        max: MAX_FRAME_BYTES,
    })?;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge { declared: len, max: MAX_FRAME_BYTES });
    }
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame header from the front of `buf`.
///
/// Does not consume `buf`; callers drive their own read loop and slice once
/// enough bytes are available. If fewer than [`HEADER_LEN`] bytes are present
/// and the stream has reached a clean EOF (no bytes at all, or 1-3 bytes),
/// the caller distinguishes those cases itself (see [`ProtocolError::TruncatedHeader`]).
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] if the declared length exceeds
/// [`MAX_FRAME_BYTES`]. The caller must not read `body_len` bytes in that case.
pub fn decode_header(buf: &[u8]) -> Result<HeaderDecode, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Ok(HeaderDecode::Incomplete);
    }
    let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if body_len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge { declared: body_len, max: MAX_FRAME_BYTES });
    }
    Ok(HeaderDecode::Complete { body_len })
}
