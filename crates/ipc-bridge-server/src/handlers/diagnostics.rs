//! `diagnostics` reference Sub-Handler: tag `diagnostics.snapshot`, requires
//! feature `diagnostics.basic`.

use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

use ciborium::value::Value;
use ipc_bridge_core::EditorStateMirror;

use crate::subhandler::SubHandler;

/// Reports the Editor State Mirror's current snapshot and the broadcast
/// set's connection count.
pub struct DiagnosticsHandler {
    mirror: Arc<EditorStateMirror>,
    connection_count: Arc<AtomicUsize>,
}

impl DiagnosticsHandler {
    /// Build a handler reading `mirror` and `connection_count` at call time.
    #[must_use]
    pub fn new(mirror: Arc<EditorStateMirror>, connection_count: Arc<AtomicUsize>) -> Self {
        Self { mirror, connection_count }
    }
}

impl SubHandler for DiagnosticsHandler {
    fn tag(&self) -> &'static str {
        "diagnostics.snapshot"
    }

    fn required_feature(&self) -> Option<&'static str> {
        Some("diagnostics.basic")
    }

    fn handle(&self, _body: &Value) -> (Value, u16) {
        let snapshot = self.mirror.snapshot();
        let body = Value::Map(vec![
            (Value::Text("is_compiling".to_string()), Value::Bool(snapshot.is_compiling)),
            (Value::Text("is_updating".to_string()), Value::Bool(snapshot.is_updating)),
            (Value::Text("editor_version".to_string()), Value::Text(snapshot.editor_version)),
            (
                Value::Text("connection_count".to_string()),
                Value::Integer(self.connection_count.load(Ordering::Acquire).into()),
            ),
        ]);
        (body, 0)
    }
}
