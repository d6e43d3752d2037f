//! Realtime traffic events.
//!
//! Every exchange that reaches a forward/mock decision publishes exactly one
//! start and one end event to the observers bound to its client id, in that
//! order. Exchanges short-circuited earlier (bad url, no client id) publish
//! nothing.

mod publisher;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use publisher::{BroadcastPublisher, EventPublisher, NoopPublisher};

pub const REQUEST_START: &str = "REQUEST_START";
pub const REQUEST_END: &str = "REQUEST_END";

/// One published event: a topic and its JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(topic: &str, payload: impl Serialize) -> Self {
        Self {
            topic: topic.to_string(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Payload published before the forward/mock decision completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStart {
    pub is_mock: bool,
    pub method: String,
    pub host: String,
    pub pathname: String,
    pub url: String,
    pub request_headers: HashMap<String, String>,
    /// Parsed POST body, or the literal string `"not POST request"`.
    pub request_data: serde_json::Value,
}

/// Payload published once the response is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnd {
    pub status: u16,
    pub request_data: serde_json::Value,
    pub request_headers: HashMap<String, String>,
    pub response_body: serde_json::Value,
    /// Wall-clock milliseconds from the start event to completion.
    pub timecost: u64,
}
