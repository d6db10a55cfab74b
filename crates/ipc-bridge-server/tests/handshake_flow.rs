//! End-to-end wire-level scenarios: a real `TcpListener`/`TcpStream` pair
//! driven through the full handshake and dispatch path.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{collections::BTreeMap, sync::Arc};

use bytes::BytesMut;
use ipc_bridge_core::{ConnectionConfig, EditorSnapshot, EditorStateMirror, SystemEnv};
use ipc_bridge_proto::{frame, Control, Envelope, Hello, Request};
use ipc_bridge_server::{
    handlers::{DiagnosticsHandler, HealthHandler},
    listener, registry::ConnectionRegistry, subhandler::SubHandlerRegistry,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::watch,
};

const SCHEMA: [u8; 32] = ipc_bridge_proto::SCHEMA_DIGEST;

fn config() -> Arc<ConnectionConfig> {
    Arc::new(ConnectionConfig {
        server_token: Some("t".to_string()),
        server_ipc_major: 1,
        server_ipc_version: "1.0".to_string(),
        server_schema_digest: SCHEMA,
        server_supported_features: std::collections::BTreeSet::from(["health.basic".to_string()]),
        server_name: "ipc-bridge".to_string(),
        server_version: "0.1.0-test".to_string(),
    })
}

fn hello(token: &str, schema: Vec<u8>, features: Vec<String>) -> Hello {
    Hello {
        token: token.to_string(),
        ipc_version: "1.0".to_string(),
        features,
        schema_hash: schema,
        project_root: "/tmp/project".to_string(),
        client_name: "test-client".to_string(),
        client_version: "0.0.0".to_string(),
        meta: BTreeMap::new(),
    }
}

/// Spawn a listener on an ephemeral port, returning its address and a
/// shutdown sender the caller can use to stop it.
async fn spawn_server(editor: Arc<EditorStateMirror>, cfg: Arc<ConnectionConfig>) -> (std::net::SocketAddr, watch::Sender<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local_addr");

    let registry = Arc::new(ConnectionRegistry::new());
    let mut handlers = SubHandlerRegistry::new();
    handlers.register(Box::new(HealthHandler::new("0.1.0-test")));
    handlers.register(Box::new(DiagnosticsHandler::new(Arc::clone(&editor), registry.connection_count_handle())));
    let handlers = Arc::new(handlers);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let env = SystemEnv::new();
    tokio::spawn(async move {
        listener::serve(listener, env, cfg, editor, registry, handlers, shutdown_rx).await.expect("serve");
    });
    (addr, shutdown_tx)
}

async fn write_control(stream: &mut TcpStream, control: &Control) {
    let payload = control.encode().expect("encode control");
    let mut framed = BytesMut::new();
    frame::encode(&payload, &mut framed).expect("frame control");
    stream.write_all(&framed).await.expect("write control");
}

async fn write_envelope(stream: &mut TcpStream, envelope: &Envelope) {
    let payload = envelope.encode().expect("encode envelope");
    let mut framed = BytesMut::new();
    frame::encode(&payload, &mut framed).expect("frame envelope");
    stream.write_all(&framed).await.expect("write envelope");
}

/// Read one length-prefixed frame's payload, or `None` on clean EOF.
async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut header = [0u8; 4];
    match stream.read_exact(&mut header).await {
        Ok(_) => {},
        Err(_) => return None,
    }
    let frame::HeaderDecode::Complete { body_len } = frame::decode_header(&header).expect("valid header") else {
        unreachable!("4 bytes always decide header completeness")
    };
    let mut body = vec![0u8; body_len as usize];
    stream.read_exact(&mut body).await.expect("read body");
    Some(body)
}

#[tokio::test]
async fn happy_path_health_query() {
    let editor = Arc::new(EditorStateMirror::new());
    editor.refresh(EditorSnapshot { is_compiling: false, is_updating: false, editor_version: "6000.0.1f1".to_string() });
    let (addr, shutdown) = spawn_server(Arc::clone(&editor), config()).await;

    let mut client = TcpStream::connect(addr).await.expect("connect");
    write_control(&mut client, &Control::Hello(hello("t", SCHEMA.to_vec(), vec!["health.basic".to_string()]))).await;

    let welcome_bytes = read_frame(&mut client).await.expect("welcome frame");
    let Control::Welcome(welcome) = Control::decode(&welcome_bytes).expect("decode welcome") else {
        unreachable!("server always welcomes a valid hello")
    };
    assert!(welcome.accepted_features.contains(&"health.basic".to_string()));
    assert!(!welcome.session_id.is_empty());

    write_envelope(
        &mut client,
        &Envelope::Request(Request { correlation_id: "r1".to_string(), tag: "health.basic".to_string(), body: ciborium::value::Value::Null }),
    )
    .await;

    let response_bytes = read_frame(&mut client).await.expect("response frame");
    let Envelope::Response(response) = Envelope::decode(&response_bytes).expect("decode response") else {
        unreachable!("request always gets a response")
    };
    assert_eq!(response.correlation_id, "r1");
    assert_eq!(response.status, 0);

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn schema_mismatch_is_rejected() {
    let editor = Arc::new(EditorStateMirror::new());
    let (addr, shutdown) = spawn_server(Arc::clone(&editor), config()).await;

    let mut client = TcpStream::connect(addr).await.expect("connect");
    let mut bad_schema = SCHEMA.to_vec();
    bad_schema[0] ^= 0xFF;
    write_control(&mut client, &Control::Hello(hello("t", bad_schema, vec![]))).await;

    let reject_bytes = read_frame(&mut client).await.expect("reject frame");
    let Control::Reject(reject) = Control::decode(&reject_bytes).expect("decode reject") else {
        unreachable!("mismatched schema is always rejected")
    };
    assert_eq!(reject.code, ipc_bridge_proto::RejectCode::FailedPrecondition);
    assert!(reject.message.contains("schema hash mismatch"));
    assert!(read_frame(&mut client).await.is_none());

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn editor_busy_is_rejected() {
    let editor = Arc::new(EditorStateMirror::new());
    editor.refresh(EditorSnapshot { is_compiling: true, is_updating: false, editor_version: "6000.0.1f1".to_string() });
    let (addr, shutdown) = spawn_server(Arc::clone(&editor), config()).await;

    let mut client = TcpStream::connect(addr).await.expect("connect");
    write_control(&mut client, &Control::Hello(hello("t", SCHEMA.to_vec(), vec![]))).await;

    let reject_bytes = read_frame(&mut client).await.expect("reject frame");
    let Control::Reject(reject) = Control::decode(&reject_bytes).expect("decode reject") else {
        unreachable!("busy editor is always rejected")
    };
    assert_eq!(reject.code, ipc_bridge_proto::RejectCode::Unavailable);
    assert_eq!(reject.message, "editor compiling");

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn feature_gating_denies_ungranted_requests_but_keeps_connection_open() {
    let editor = Arc::new(EditorStateMirror::new());
    let (addr, shutdown) = spawn_server(Arc::clone(&editor), config()).await;

    let mut client = TcpStream::connect(addr).await.expect("connect");
    write_control(&mut client, &Control::Hello(hello("t", SCHEMA.to_vec(), vec!["health.basic".to_string()]))).await;
    let _ = read_frame(&mut client).await.expect("welcome frame");

    write_envelope(
        &mut client,
        &Envelope::Request(Request {
            correlation_id: "r1".to_string(),
            tag: "diagnostics.snapshot".to_string(),
            body: ciborium::value::Value::Null,
        }),
    )
    .await;
    let response_bytes = read_frame(&mut client).await.expect("response frame");
    let Envelope::Response(response) = Envelope::decode(&response_bytes).expect("decode response") else {
        unreachable!("request always gets a response")
    };
    assert_eq!(response.status, 2); // PERMISSION_DENIED
    assert!(response.message.is_some_and(|m| m.contains("diagnostics.basic")));

    write_envelope(
        &mut client,
        &Envelope::Request(Request { correlation_id: "r2".to_string(), tag: "health.basic".to_string(), body: ciborium::value::Value::Null }),
    )
    .await;
    let response_bytes = read_frame(&mut client).await.expect("second response frame, connection stays open");
    let Envelope::Response(response) = Envelope::decode(&response_bytes).expect("decode response") else {
        unreachable!("request always gets a response")
    };
    assert_eq!(response.correlation_id, "r2");
    assert_eq!(response.status, 0);

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn ungraceful_disconnect_after_request_does_not_crash_the_listener() {
    let editor = Arc::new(EditorStateMirror::new());
    let (addr, shutdown) = spawn_server(Arc::clone(&editor), config()).await;

    {
        let mut client = TcpStream::connect(addr).await.expect("connect");
        write_control(&mut client, &Control::Hello(hello("t", SCHEMA.to_vec(), vec!["health.basic".to_string()]))).await;
        let _ = read_frame(&mut client).await.expect("welcome frame");
        write_envelope(
            &mut client,
            &Envelope::Request(Request { correlation_id: "r1".to_string(), tag: "health.basic".to_string(), body: ciborium::value::Value::Null }),
        )
        .await;
        // Drop the client before reading the response.
    }

    // The listener must still accept new connections after the abrupt close.
    let mut second = TcpStream::connect(addr).await.expect("connect after peer drop");
    write_control(&mut second, &Control::Hello(hello("t", SCHEMA.to_vec(), vec!["health.basic".to_string()]))).await;
    let welcome_bytes = read_frame(&mut second).await.expect("welcome frame after prior disconnect");
    assert!(Control::decode(&welcome_bytes).is_ok());

    let _ = shutdown.send(true);
}
