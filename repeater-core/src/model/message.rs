use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One control frame on the WebSocket channel.
///
/// `data` is a JSON object on inbound frames (`join`, `leave`, `candidate`,
/// `answer`) and a JSON-encoded *string* on outbound frames (`offer`,
/// `candidate`). The inner encoding is part of the wire contract: clients
/// expect to `JSON.parse` the payload a second time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl WsMessage {
    /// Outbound `offer` frame carrying a JSON-encoded session description.
    pub fn offer(description_json: String) -> Self {
        Self {
            kind: "offer".to_owned(),
            data: Value::String(description_json),
        }
    }

    /// Outbound `candidate` frame carrying a JSON-encoded ICE candidate.
    pub fn candidate(candidate_json: String) -> Self {
        Self {
            kind: "candidate".to_owned(),
            data: Value::String(candidate_json),
        }
    }

    /// String field of the inbound `data` object, if present.
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}
