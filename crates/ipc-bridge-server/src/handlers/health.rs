//! `health` reference Sub-Handler: tag `health.basic`, no required feature.

use ciborium::value::Value;

use crate::subhandler::SubHandler;

/// Reports readiness and the bridge's own version.
pub struct HealthHandler {
    version: String,
}

impl HealthHandler {
    /// Build a handler reporting `version` as the bridge's own version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self { version: version.into() }
    }
}

impl SubHandler for HealthHandler {
    fn tag(&self) -> &'static str {
        "health.basic"
    }

    fn required_feature(&self) -> Option<&'static str> {
        None
    }

    fn handle(&self, _body: &Value) -> (Value, u16) {
        let body = Value::Map(vec![
            (Value::Text("ready".to_string()), Value::Bool(true)),
            (Value::Text("version".to_string()), Value::Text(self.version.clone())),
        ]);
        (body, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_ready_and_version() {
        let handler = HealthHandler::new("0.1.0");
        let (body, status) = handler.handle(&Value::Null);
        assert_eq!(status, 0);
        assert_eq!(
            body,
            Value::Map(vec![
                (Value::Text("ready".to_string()), Value::Bool(true)),
                (Value::Text("version".to_string()), Value::Text("0.1.0".to_string())),
            ])
        );
    }

    #[test]
    fn requires_no_feature() {
        assert_eq!(HealthHandler::new("0.1.0").required_feature(), None);
    }
}
