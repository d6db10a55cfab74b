//! Connection state machine and Handshake Validator.
//!
//! ```text
//!              Hello ok             EOF / error / shutdown
//! AwaitingHello ------> Active ---------------------------> Closed
//!      |                                                      ^
//!      +------------------------------------------------------+
//!                       Hello rejected
//! ```

use ipc_bridge_proto::{Hello, Reject, RejectCode, Welcome};

use crate::{env::Environment, error::ConnectionError, feature_guard::FeatureGuard, mirror::EditorSnapshot};

/// Generate a fresh UUID v4 session id using `env`'s randomness.
#[must_use]
pub fn generate_session_id<E: Environment>(env: &E) -> String {
    let mut bytes = env.random_bytes16();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

/// Server-side configuration the Handshake Validator checks a `Hello`
/// against.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Expected token, or `None` if the token check is disabled.
    pub server_token: Option<String>,
    /// Server's supported major IPC version (the "1.0" baseline).
    pub server_ipc_major: u32,
    /// Full server IPC version string returned in `Welcome.ipc_version`.
    pub server_ipc_version: String,
    /// Server's compile-time schema digest.
    pub server_schema_digest: [u8; 32],
    /// Feature tags the server knows how to serve.
    pub server_supported_features: std::collections::BTreeSet<String>,
    /// Returned in `Welcome.server_name`.
    pub server_name: String,
    /// Returned in `Welcome.server_version`.
    pub server_version: String,
}

/// States a connection can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, no `Hello` decoded yet.
    AwaitingHello,
    /// Handshake succeeded; envelopes may flow.
    Active,
    /// Terminated; no further frames will be read or written.
    Closed,
}

impl ConnectionState {
    fn name(self) -> &'static str {
        match self {
            Self::AwaitingHello => "AwaitingHello",
            Self::Active => "Active",
            Self::Closed => "Closed",
        }
    }
}

/// Parses a `MAJOR.MINOR` version string.
fn parse_ipc_version(version: &str) -> Result<(u32, u32), Reject> {
    if version.is_empty() {
        return Err(Reject { code: RejectCode::FailedPrecondition, message: "missing ipc_version".to_string() });
    }
    let (major_str, minor_str) = version.split_once('.').ok_or_else(|| Reject {
        code: RejectCode::OutOfRange,
        message: format!("ipc_version {version} not supported; server=1.0"),
    })?;
    let major = major_str.parse::<u32>().map_err(|_| Reject {
        code: RejectCode::OutOfRange,
        message: format!("ipc_version {version} not supported; server=1.0"),
    })?;
    let minor = minor_str.parse::<u32>().map_err(|_| Reject {
        code: RejectCode::OutOfRange,
        message: format!("ipc_version {version} not supported; server=1.0"),
    })?;
    Ok((major, minor))
}

fn check_token(hello: &Hello, config: &ConnectionConfig) -> Result<(), Reject> {
    if hello.token.is_empty() {
        return Err(Reject {
            code: RejectCode::Unauthenticated,
            message: "Missing or empty token".to_string(),
        });
    }
    if let Some(expected) = &config.server_token
        && !tokens_equal(expected, &hello.token)
    {
        return Err(Reject { code: RejectCode::Unauthenticated, message: "Invalid token".to_string() });
    }
    Ok(())
}

/// Constant-time token comparison: avoids leaking a match length via timing,
/// the same rationale as `ipc_bridge_proto::schema::digests_equal`.
fn tokens_equal(expected: &str, actual: &str) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in expected.bytes().zip(actual.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}

fn check_ipc_version(hello: &Hello, config: &ConnectionConfig) -> Result<(), Reject> {
    let (major, _minor) = parse_ipc_version(&hello.ipc_version)?;
    if major != config.server_ipc_major {
        return Err(Reject {
            code: RejectCode::OutOfRange,
            message: format!("ipc_version {} not supported; server=1.0", hello.ipc_version),
        });
    }
    Ok(())
}

fn check_editor_state(editor: &EditorSnapshot) -> Result<(), Reject> {
    if editor.is_compiling {
        return Err(Reject { code: RejectCode::Unavailable, message: "editor compiling".to_string() });
    }
    if editor.is_updating {
        return Err(Reject { code: RejectCode::Unavailable, message: "editor updating".to_string() });
    }
    Ok(())
}

fn check_schema_digest(hello: &Hello, config: &ConnectionConfig) -> Result<(), Reject> {
    if hello.schema_hash.is_empty() {
        return Err(Reject {
            code: RejectCode::FailedPrecondition,
            message: "schema hash missing".to_string(),
        });
    }
    if hello.schema_hash.len() != 32 {
        return Err(Reject {
            code: RejectCode::FailedPrecondition,
            message: "schema hash length mismatch".to_string(),
        });
    }
    let mut client_digest = [0u8; 32];
    client_digest.copy_from_slice(&hello.schema_hash);
    if !ipc_bridge_proto::schema::digests_equal(&client_digest, &config.server_schema_digest) {
        return Err(Reject {
            code: RejectCode::FailedPrecondition,
            message: "schema hash mismatch".to_string(),
        });
    }
    Ok(())
}

/// Runs the four handshake validations in the fixed order mandated by the
/// spec; the first failure determines the rejection. On success, returns the
/// negotiated feature set (everything else needed to build a `Welcome` is
/// already known to the caller).
///
/// This function is pure: the caller is responsible for having already
/// fetched `editor` via a single main-thread dispatcher hop, so the check
/// here cannot race a compilation-state transition happening concurrently
/// with validation.
pub fn validate_hello(hello: &Hello, config: &ConnectionConfig, editor: &EditorSnapshot) -> Result<Vec<String>, Reject> {
    check_token(hello, config)?;
    check_ipc_version(hello, config)?;
    check_editor_state(editor)?;
    check_schema_digest(hello, config)?;
    Ok(crate::feature_guard::negotiate_features(&hello.features, &config.server_supported_features))
}

/// One accepted connection's state.
pub struct Connection {
    state: ConnectionState,
    session_id: Option<String>,
    feature_guard: Option<FeatureGuard>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    /// A freshly accepted connection, in `AwaitingHello`.
    #[must_use]
    pub fn new() -> Self {
        Self { state: ConnectionState::AwaitingHello, session_id: None, feature_guard: None }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The connection's session id, set once the handshake completes.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The connection's negotiated feature guard, set once the handshake
    /// completes.
    #[must_use]
    pub fn feature_guard(&self) -> Option<&FeatureGuard> {
        self.feature_guard.as_ref()
    }

    /// Validate `hello` and, on success, transition to `Active` and build the
    /// `Welcome` to send; on failure, transition to `Closed` (the caller must
    /// still send the returned `Reject` and close the stream) and build the
    /// `Reject` to send.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidState`] if called outside
    /// `AwaitingHello` (e.g. a second `Hello` on an already-active
    /// connection).
    #[allow(clippy::too_many_arguments)]
    pub fn accept_hello(
        &mut self,
        hello: &Hello,
        config: &ConnectionConfig,
        editor: &EditorSnapshot,
        session_id: String,
    ) -> Result<Result<Welcome, Reject>, ConnectionError> {
        if self.state != ConnectionState::AwaitingHello {
            return Err(ConnectionError::InvalidState {
                state: self.state.name(),
                operation: "accept_hello",
            });
        }

        match validate_hello(hello, config, editor) {
            Ok(accepted_features) => {
                self.feature_guard = Some(FeatureGuard::new(accepted_features.clone()));
                self.session_id = Some(session_id.clone());
                self.state = ConnectionState::Active;
                Ok(Ok(Welcome {
                    ipc_version: config.server_ipc_version.clone(),
                    accepted_features,
                    schema_hash: config.server_schema_digest,
                    server_name: config.server_name.clone(),
                    server_version: config.server_version.clone(),
                    editor_version: editor.editor_version.clone(),
                    session_id,
                    meta: std::collections::BTreeMap::new(),
                }))
            },
            Err(reject) => {
                self.state = ConnectionState::Closed;
                Ok(Err(reject))
            },
        }
    }

    /// Mark the connection `Closed`. Idempotent.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.feature_guard = None;
    }
}
