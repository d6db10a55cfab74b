//! Connection Handler: the thin async I/O loop around [`ConnectionDriver`]
//! and the handshake.

use std::{sync::Arc, time::Duration};

use bytes::BytesMut;
use ipc_bridge_core::{generate_session_id, Connection, ConnectionConfig, Environment, EditorStateMirror};
use ipc_bridge_proto::{frame, Control, Envelope};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};

use crate::{
    driver::{ConnectionAction, ConnectionDriver, ConnectionEvent},
    registry::ConnectionRegistry,
    subhandler::SubHandlerRegistry,
};

/// Read timeout for each individual handshake read.
const HANDSHAKE_FRAME_TIMEOUT_MS: u64 = 2000;
/// Total budget for the handshake to complete.
const HANDSHAKE_TOTAL_TIMEOUT_MS: u64 = 3000;

/// Read one length-prefixed frame's payload off `stream`, or `None` on a
/// clean EOF before any bytes arrived.
async fn read_frame(stream: &mut TcpStream) -> Result<Option<Vec<u8>>, ipc_bridge_proto::ProtocolError> {
    let mut header = [0u8; 4];
    match stream.read_exact(&mut header).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(_) => return Err(ipc_bridge_proto::ProtocolError::TruncatedHeader { got: 0 }),
    }
    let body_len = match frame::decode_header(&header)? {
        frame::HeaderDecode::Complete { body_len } => body_len,
        frame::HeaderDecode::Incomplete => unreachable!("4 bytes always decide header completeness"),
    };
    let mut body = vec![0u8; body_len as usize];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|_| ipc_bridge_proto::ProtocolError::TruncatedBody { expected: body_len, got: 0 })?;
    Ok(Some(body))
}

async fn write_envelope(stream: &mut TcpStream, envelope: &Envelope) -> std::io::Result<()> {
    let payload = envelope.encode().map_err(std::io::Error::other)?;
    let mut framed = BytesMut::new();
    frame::encode(&payload, &mut framed).map_err(std::io::Error::other)?;
    stream.write_all(&framed).await
}

async fn write_control(stream: &mut TcpStream, control: &Control) -> std::io::Result<()> {
    let payload = control.encode().map_err(std::io::Error::other)?;
    let mut framed = BytesMut::new();
    frame::encode(&payload, &mut framed).map_err(std::io::Error::other)?;
    stream.write_all(&framed).await
}

/// Drive one accepted TCP connection end to end: handshake, then the
/// post-handshake dispatch loop, until EOF, error, or shutdown.
pub async fn handle_connection<E: Environment>(
    mut stream: TcpStream,
    env: E,
    config: Arc<ConnectionConfig>,
    editor: Arc<EditorStateMirror>,
    registry: Arc<ConnectionRegistry>,
    handlers: Arc<SubHandlerRegistry>,
) {
    let mut connection = Connection::new();

    let handshake_result = tokio::time::timeout(
        Duration::from_millis(HANDSHAKE_TOTAL_TIMEOUT_MS),
        run_handshake(&mut stream, &env, &mut connection, &config, &editor),
    )
    .await;

    let Ok(Ok(())) = handshake_result else {
        tracing::debug!("handshake failed or timed out, closing connection");
        return;
    };

    let Some(feature_guard) = connection.feature_guard().cloned() else {
        tracing::error!("connection reported Active without a feature guard; closing");
        return;
    };
    let session_id = connection.session_id().unwrap_or_default().to_string();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    registry.register(session_hash(&session_id), outbound_tx, feature_guard.clone()).await;

    let mut driver = ConnectionDriver::new(feature_guard);

    loop {
        tokio::select! {
            framed = outbound_rx.recv() => {
                let Some(framed) = framed else { break };
                if stream.write_all(&framed).await.is_err() {
                    break;
                }
            }
            frame_result = read_frame(&mut stream) => {
                match frame_result {
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "frame decode error, closing connection");
                        break;
                    },
                    Ok(Some(payload)) => {
                        let Ok(envelope) = Envelope::decode(&payload) else {
                            tracing::debug!("malformed envelope, closing connection");
                            break;
                        };
                        for action in driver.process_event(ConnectionEvent::FrameReceived(envelope), &handlers) {
                            if !apply_action(&mut stream, action).await {
                                registry.unregister(session_hash(&session_id)).await;
                                return;
                            }
                        }
                    },
                }
            }
        }
    }

    registry.unregister(session_hash(&session_id)).await;
}

async fn apply_action(stream: &mut TcpStream, action: ConnectionAction) -> bool {
    match action {
        ConnectionAction::SendEnvelope(envelope) => write_envelope(stream, &envelope).await.is_ok(),
        ConnectionAction::CloseConnection(reason) => {
            tracing::debug!(%reason, "closing connection");
            false
        },
        ConnectionAction::Log { level, message } => {
            match level {
                ipc_bridge_proto::LogLevel::Trace | ipc_bridge_proto::LogLevel::Debug => {
                    tracing::debug!("{message}");
                },
                ipc_bridge_proto::LogLevel::Info => tracing::info!("{message}"),
                ipc_bridge_proto::LogLevel::Warn => tracing::warn!("{message}"),
                ipc_bridge_proto::LogLevel::Error => tracing::error!("{message}"),
            }
            true
        },
    }
}

async fn run_handshake<E: Environment>(
    stream: &mut TcpStream,
    env: &E,
    connection: &mut Connection,
    config: &ConnectionConfig,
    editor: &EditorStateMirror,
) -> Result<(), ()> {
    let payload = tokio::time::timeout(Duration::from_millis(HANDSHAKE_FRAME_TIMEOUT_MS), read_frame(stream))
        .await
        .map_err(|_| ())?
        .map_err(|_| ())?
        .ok_or(())?;

    let Ok(Control::Hello(hello)) = Control::decode(&payload) else { return Err(()) };

    let session_id = generate_session_id(env);
    let outcome = connection.accept_hello(&hello, config, &editor.snapshot(), session_id).map_err(|_| ())?;

    match outcome {
        Ok(welcome) => write_control(stream, &Control::Welcome(welcome)).await.map_err(|_| ()),
        Err(reject) => {
            let _ = write_control(stream, &Control::Reject(reject)).await;
            Err(())
        },
    }
}

/// Derives a `u64` registry key from a session id string. The registry only
/// needs a stable, cheap-to-compare key; the session id itself (carried in
/// `Welcome`) is the identity that matters on the wire.
fn session_hash(session_id: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    session_id.hash(&mut hasher);
    hasher.finish()
}
