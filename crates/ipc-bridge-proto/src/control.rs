//! `Control` messages: `Hello`, `Welcome`, `Reject`.
//!
//! Framed identically to [`crate::envelope::Envelope`] but only ever expected
//! as the first frame on a connection, before the handshake has completed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Maximum length of an envelope `correlation_id`, in bytes.
pub const MAX_CORRELATION_LEN: usize = 64;

/// Client's opening handshake message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Shared secret configured out-of-band; see `MCP.IpcToken`.
    pub token: String,
    /// "MAJOR.MINOR" version string the client speaks.
    pub ipc_version: String,
    /// Requested feature tags, in preference order; duplicates are dropped
    /// during negotiation, not here.
    pub features: Vec<String>,
    /// Client's schema digest, expected to be exactly 32 bytes.
    pub schema_hash: Vec<u8>,
    /// Absolute path to the project the client believes it is attaching to.
    pub project_root: String,
    /// Human-readable client name, for logs.
    pub client_name: String,
    /// Client build/version string, for logs.
    pub client_version: String,
    /// Free-form client metadata.
    pub meta: BTreeMap<String, String>,
}

/// Server's handshake acceptance message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    /// Server-selected "MAJOR.MINOR" version.
    pub ipc_version: String,
    /// `requested ∩ server_supported`, preserving request order.
    pub accepted_features: Vec<String>,
    /// Server's schema digest; always equal to the client's on success.
    pub schema_hash: [u8; 32],
    /// Human-readable server name.
    pub server_name: String,
    /// Server build/version string.
    pub server_version: String,
    /// Editor version observed at handshake time.
    pub editor_version: String,
    /// Fresh UUID v4 assigned to this connection.
    pub session_id: String,
    /// Free-form server metadata.
    pub meta: BTreeMap<String, String>,
}

/// Reject reason codes, bit-exact with the external wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RejectCode {
    /// Missing, empty, or mismatched token.
    Unauthenticated = 0,
    /// Malformed or missing required field (version, schema length).
    FailedPrecondition = 1,
    /// Feature not in the connection's accepted set.
    PermissionDenied = 2,
    /// Value outside the accepted range (version major mismatch).
    OutOfRange = 3,
    /// Unexpected internal failure.
    Internal = 4,
    /// Editor is transiently unable to accept connections.
    Unavailable = 5,
}

/// Server's handshake rejection message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    /// Machine-readable rejection reason.
    pub code: RejectCode,
    /// Single short sentence, safe to show an operator.
    pub message: String,
}

/// Discriminated union of handshake-phase messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    /// Sent by the client as the first frame on a connection.
    Hello(Hello),
    /// Sent by the server on successful handshake.
    Welcome(Welcome),
    /// Sent by the server on handshake failure.
    Reject(Reject),
}

impl Control {
    /// Serialize to the CBOR bytes carried as a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if CBOR encoding fails, which can
    /// only happen for pathological inputs (e.g. non-finite floats, not used
    /// by any field here).
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from frame payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] on any CBOR structural error.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_hello() -> Hello {
        Hello {
            token: "t".into(),
            ipc_version: "1.0".into(),
            features: vec!["health.basic".into()],
            schema_hash: vec![0u8; 32],
            project_root: "/tmp/project".into(),
            client_name: "orchestrator".into(),
            client_version: "0.1.0".into(),
            meta: BTreeMap::new(),
        }
    }

    #[test]
    fn hello_round_trips() {
        let hello = Control::Hello(sample_hello());
        let encoded = hello.encode().unwrap();
        assert_eq!(Control::decode(&encoded).unwrap(), hello);
    }

    #[test]
    fn welcome_round_trips() {
        let welcome = Control::Welcome(Welcome {
            ipc_version: "1.0".into(),
            accepted_features: vec!["health.basic".into()],
            schema_hash: [7u8; 32],
            server_name: "unity-bridge".into(),
            server_version: "0.1.0".into(),
            editor_version: "6000.0.1f1".into(),
            session_id: "b3b1f7b0-3e9b-4d2a-9c6a-5a0a8a9b7a10".into(),
            meta: BTreeMap::new(),
        });
        let encoded = welcome.encode().unwrap();
        assert_eq!(Control::decode(&encoded).unwrap(), welcome);
    }

    #[test]
    fn reject_round_trips() {
        let reject =
            Control::Reject(Reject { code: RejectCode::Unavailable, message: "editor compiling".into() });
        let encoded = reject.encode().unwrap();
        assert_eq!(Control::decode(&encoded).unwrap(), reject);
    }

    #[test]
    fn malformed_bytes_fail_to_decode() {
        assert!(Control::decode(&[0xff, 0x00]).is_err());
    }
}
