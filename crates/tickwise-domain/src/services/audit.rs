use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub run_id: String,
    pub timestamp: i64,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(run_id: &str, timestamp: i64, stage: &str, symbol: &str, action: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            timestamp,
            stage: stage.to_string(),
            symbol: Some(symbol.to_string()),
            action: action.to_string(),
            error: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Orders events by timestamp; events sharing a timestamp keep insertion order.
pub fn sort_events(events: &mut [AuditEvent]) {
    events.sort_by_key(|event| event.timestamp);
}
