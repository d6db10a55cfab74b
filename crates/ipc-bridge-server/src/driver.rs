//! Per-connection dispatch logic expressed as a pure function from a decoded
//! event to a list of actions, independent of the socket (§4.8's "Internal
//! architecture" requirement: testable without opening a real `TcpStream`).

use ipc_bridge_core::FeatureGuard;
use ipc_bridge_proto::{Envelope, LogLevel, Request, Response};

use crate::subhandler::{SubHandlerRegistry, STATUS_PERMISSION_DENIED, STATUS_UNKNOWN_TAG};

/// An event the driver reacts to.
pub enum ConnectionEvent {
    /// A frame was decoded off the wire.
    FrameReceived(Envelope),
    /// The connection is being torn down for `reason`.
    Close(String),
}

/// An action the async I/O loop must carry out.
pub enum ConnectionAction {
    /// Write this envelope to the peer.
    SendEnvelope(Envelope),
    /// Close the socket and stop reading.
    CloseConnection(String),
    /// Emit a log line at `level`.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message text.
        message: String,
    },
}

/// Pure post-handshake dispatch logic for one connection.
pub struct ConnectionDriver {
    feature_guard: FeatureGuard,
}

impl ConnectionDriver {
    /// Build a driver bound to the connection's negotiated feature guard.
    #[must_use]
    pub fn new(feature_guard: FeatureGuard) -> Self {
        Self { feature_guard }
    }

    /// Process one event, returning the actions it produces.
    pub fn process_event(&mut self, event: ConnectionEvent, handlers: &SubHandlerRegistry) -> Vec<ConnectionAction> {
        match event {
            ConnectionEvent::FrameReceived(Envelope::Request(request)) => {
                vec![ConnectionAction::SendEnvelope(Envelope::Response(self.dispatch(request, handlers)))]
            },
            ConnectionEvent::FrameReceived(Envelope::Response(_) | Envelope::Event(_)) => {
                vec![ConnectionAction::Log {
                    level: LogLevel::Warn,
                    message: "unexpected response/event frame from peer, ignoring".to_string(),
                }]
            },
            ConnectionEvent::Close(reason) => vec![ConnectionAction::CloseConnection(reason)],
        }
    }

    fn dispatch(&self, request: Request, handlers: &SubHandlerRegistry) -> Response {
        let Some(handler) = handlers.get(&request.tag) else {
            let message = format!("unknown tag: {}", request.tag);
            return Response {
                correlation_id: request.correlation_id,
                tag: request.tag,
                status: STATUS_UNKNOWN_TAG,
                message: Some(message),
                body: ciborium::value::Value::Null,
            };
        };

        if let Some(required) = handler.required_feature()
            && !self.feature_guard.is_enabled(required)
        {
            return Response {
                correlation_id: request.correlation_id,
                tag: request.tag,
                status: STATUS_PERMISSION_DENIED,
                message: Some(format!("feature {required} not enabled")),
                body: ciborium::value::Value::Null,
            };
        }

        let (body, status) = handler.handle(&request.body);
        Response {
            correlation_id: request.correlation_id,
            tag: request.tag,
            status,
            message: None,
            body,
        }
    }
}
