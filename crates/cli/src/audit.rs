//! Structured audit trail, emitted under the `audit` tracing target.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub struct AuditEvent<'a> {
    pub timestamp: f64,
    pub request_id: &'a str,
    pub event_type: &'a str,
    pub session_id: &'a str,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl<'a> AuditEvent<'a> {
    pub fn new(event_type: &'a str, request_id: &'a str, session_id: &'a str) -> Self {
        let now = chrono::Utc::now();
        Self {
            timestamp: now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0,
            request_id,
            event_type,
            session_id,
            details: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn emit(self) {
        tracing::info!(
            target: "audit",
            request_id = self.request_id,
            event_type = self.event_type,
            session_id = self.session_id,
            "{}",
            self.to_json()
        );
    }
}
