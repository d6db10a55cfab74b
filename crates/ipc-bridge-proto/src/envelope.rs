//! Post-handshake `Envelope` messages: `Request`, `Response`, `Event`.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::{control::MAX_CORRELATION_LEN, error::ProtocolError};

/// Severity of a [`EventKind::Log`] event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Verbose.
    Debug,
    /// Default level.
    Info,
    /// Always delivered, never dropped under back-pressure.
    Warn,
    /// Always delivered, never dropped under back-pressure.
    Error,
}

impl LogLevel {
    /// Whether an event at this level is allowed to be dropped under
    /// back-pressure. Only `warn` and `error` are never droppable.
    #[must_use]
    pub fn droppable(self) -> bool {
        !matches!(self, Self::Warn | Self::Error)
    }
}

/// Tagged union of event kinds published by the Event Publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// A log line produced by Editor-side code.
    Log {
        /// Severity.
        level: LogLevel,
        /// Subsystem the log line is attributed to.
        category: String,
        /// Human-readable message.
        message: String,
    },
    /// Progress update for a long-running operation. At most one pending
    /// record per `operation_id` is retained by the publisher; newer
    /// replaces older.
    Progress {
        /// Identifier assigned by the sub-handler that started the operation.
        operation_id: String,
        /// Subsystem the operation belongs to.
        category: String,
        /// Completion fraction in `[0.0, 1.0]`, if known.
        fraction: Option<f32>,
        /// Human-readable status message.
        message: Option<String>,
    },
    /// A lifecycle notification (e.g. "compilation started").
    Lifecycle {
        /// Subsystem the notification belongs to.
        category: String,
        /// Human-readable message.
        message: String,
    },
}

impl EventKind {
    /// Whether this event may be dropped under publisher back-pressure.
    ///
    /// Log events defer to [`LogLevel::droppable`]; progress events are
    /// never dropped outright (they coalesce instead); lifecycle events are
    /// never dropped.
    #[must_use]
    pub fn droppable(&self) -> bool {
        match self {
            Self::Log { level, .. } => level.droppable(),
            Self::Progress { .. } | Self::Lifecycle { .. } => false,
        }
    }

    /// The coalescing key for progress events, `None` for everything else.
    #[must_use]
    pub fn coalesce_key(&self) -> Option<&str> {
        match self {
            Self::Progress { operation_id, .. } => Some(operation_id.as_str()),
            Self::Log { .. } | Self::Lifecycle { .. } => None,
        }
    }
}

/// An asynchronous event published outside the request/response cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic nanosecond timestamp, not wall-clock time.
    pub timestamp_nanos: u64,
    /// The event payload.
    pub kind: EventKind,
}

/// A typed request, keyed by `tag` (e.g. `"health"`, `"diagnostics"`).
///
/// `body` is left as a raw CBOR [`Value`] because request payload shapes are
/// owned by pluggable sub-handlers outside this crate; only `tag` is used for
/// routing here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Opaque, client-chosen, echoed back on the matching response.
    pub correlation_id: String,
    /// Names the sub-handler this request is routed to.
    pub tag: String,
    /// Tag-specific body, decoded by the sub-handler.
    pub body: Value,
}

/// A typed response, mirroring the `Request` it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Equal to the originating request's `correlation_id`.
    pub correlation_id: String,
    /// Same tag as the originating request.
    pub tag: String,
    /// 0 on success, non-zero otherwise.
    pub status: u16,
    /// Short operator-facing message; required when `status != 0`.
    pub message: Option<String>,
    /// Tag-specific body.
    pub body: Value,
}

/// Discriminated union of post-handshake messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Envelope {
    /// Client-to-server.
    Request(Request),
    /// Server-to-client.
    Response(Response),
    /// Server-to-client, unsolicited.
    Event(Event),
}

impl Envelope {
    /// Serialize to the CBOR bytes carried as a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if CBOR encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from frame payload bytes, validating invariants that the wire
    /// format itself cannot express (correlation id length).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] on CBOR structural errors or on a
    /// `correlation_id` longer than [`MAX_CORRELATION_LEN`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Self =
            ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let correlation_id = match &envelope {
            Self::Request(r) => Some(&r.correlation_id),
            Self::Response(r) => Some(&r.correlation_id),
            Self::Event(_) => None,
        };
        if let Some(id) = correlation_id
            && id.len() > MAX_CORRELATION_LEN
        {
            return Err(ProtocolError::Malformed(format!(
                "correlation_id length {} exceeds max {MAX_CORRELATION_LEN}",
                id.len()
            )));
        }
        Ok(envelope)
    }
}
