//! IPC bridge demo binary.
//!
//! There is no real Unity Editor host in this repository; this binary starts
//! the bridge standalone for manual exercising and local testing, exactly as
//! described for the core's CLI surface.
//!
//! ```bash
//! ipc-bridge-server --bind 127.0.0.1:7777
//! ```

use std::sync::Arc;

use clap::Parser;
use ipc_bridge_core::{ConnectionConfig, EditorStateMirror, SystemEnv};
use ipc_bridge_server::{
    handlers::{DiagnosticsHandler, HealthHandler},
    listener, publisher::EventPublisher, registry::ConnectionRegistry, subhandler::SubHandlerRegistry,
};
use tokio::sync::watch;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Editor-side IPC bridge
#[derive(Parser, Debug)]
#[command(name = "ipc-bridge-server")]
#[command(about = "Editor-side IPC bridge server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = listener::DEFAULT_BIND_ADDR)]
    bind: String,

    /// Handshake token; overrides `IPC_BRIDGE_TOKEN` if set
    #[arg(long)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let token = args.token.or_else(|| std::env::var("IPC_BRIDGE_TOKEN").ok()).filter(|t| !t.is_empty());

    tracing::info!("ipc-bridge starting");

    let editor = Arc::new(EditorStateMirror::new());
    let registry = Arc::new(ConnectionRegistry::new());
    let publisher = Arc::new(EventPublisher::new());

    let mut handlers = SubHandlerRegistry::new();
    handlers.register(Box::new(HealthHandler::new(env!("CARGO_PKG_VERSION"))));
    handlers.register(Box::new(DiagnosticsHandler::new(
        Arc::clone(&editor),
        registry.connection_count_handle(),
    )));
    let handlers = Arc::new(handlers);

    let config = Arc::new(ConnectionConfig {
        server_token: token,
        server_ipc_major: 1,
        server_ipc_version: "1.0".to_string(),
        server_schema_digest: ipc_bridge_proto::SCHEMA_DIGEST,
        server_supported_features: std::collections::BTreeSet::from([
            "health.basic".to_string(),
            "diagnostics.basic".to_string(),
        ]),
        server_name: "ipc-bridge".to_string(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let env = SystemEnv::new();

    let pump_registry = Arc::clone(&registry);
    let pump_publisher = Arc::clone(&publisher);
    let pump_env = env.clone();
    tokio::spawn(async move {
        pump_publisher.pump(&pump_env, &pump_registry).await;
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    listener::run(&args.bind, env, config, editor, registry, handlers, shutdown_rx).await?;

    Ok(())
}
