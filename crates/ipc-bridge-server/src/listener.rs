//! Listener: binds the loopback endpoint and spawns a Connection Handler per
//! accepted stream.

use std::{sync::Arc, time::Duration};

use ipc_bridge_core::{ConnectionConfig, EditorStateMirror, Environment};
use tokio::{net::TcpListener, sync::watch};

use crate::{error::BridgeError, handler::handle_connection, registry::ConnectionRegistry, subhandler::SubHandlerRegistry};

/// Default bind address per the spec's "TCP loopback, default port 7777".
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7777";
/// Delay before retrying after an accept error.
const ACCEPT_RETRY_DELAY_MS: u64 = 100;

/// Bind `addr` and accept connections until `shutdown` fires, spawning a
/// Connection Handler per accepted stream on the current Tokio runtime.
pub async fn run<E: Environment>(
    addr: &str,
    env: E,
    config: Arc<ConnectionConfig>,
    editor: Arc<EditorStateMirror>,
    registry: Arc<ConnectionRegistry>,
    handlers: Arc<SubHandlerRegistry>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    let listener =
        TcpListener::bind(addr).await.map_err(|source| BridgeError::Bind { addr: addr.to_string(), source })?;
    tracing::info!(%addr, "ipc-bridge listening");
    serve(listener, env, config, editor, registry, handlers, shutdown).await
}

/// Accept connections on an already-bound `listener` until `shutdown` fires.
/// Split out from [`run`] so tests can bind an ephemeral port (`:0`) and
/// learn the actual address before serving.
pub async fn serve<E: Environment>(
    listener: TcpListener,
    env: E,
    config: Arc<ConnectionConfig>,
    editor: Arc<EditorStateMirror>,
    registry: Arc<ConnectionRegistry>,
    handlers: Arc<SubHandlerRegistry>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    loop {
        tokio::select! {
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    tracing::info!("listener shutting down");
                    return Ok(());
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "accepted connection");
                        let env = env.clone();
                        let config = Arc::clone(&config);
                        let editor = Arc::clone(&editor);
                        let registry = Arc::clone(&registry);
                        let handlers = Arc::clone(&handlers);
                        tokio::spawn(async move {
                            handle_connection(stream, env, config, editor, registry, handlers).await;
                        });
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "accept error, retrying");
                        tokio::time::sleep(Duration::from_millis(ACCEPT_RETRY_DELAY_MS)).await;
                    },
                }
            }
        }
    }
}
