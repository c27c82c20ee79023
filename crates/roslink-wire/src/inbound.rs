//! Inbound frame classification.
//!
//! The bridge is loose about what it sends back: response frames from older
//! versions omit fields, and unknown ops show up in the wild. Classification
//! therefore goes by key presence. A `topic` key means topic delivery; a
//! `service` key means a service frame, which is a request iff
//! `op == "call_service"` and a response otherwise. Both keys present reads
//! as topic delivery. A frame with neither key is an anomaly the caller
//! drops and logs.

use serde::Deserialize;
use serde_json::Value;

use crate::WireError;

/// One classified frame from the bridge.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Message delivery on a subscribed topic.
    Topic(TopicMessage),
    /// The bridge is routing a service call to us to serve.
    ServiceRequest(ServiceRequestFrame),
    /// Reply to a `call_service` we sent earlier.
    ServiceResponse(ServiceResponseFrame),
}

/// Topic delivery (`{"op":"publish","topic":...,"msg":...}`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TopicMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Message payload; null when the bridge sent none.
    #[serde(default)]
    pub msg: Value,
}

/// Service call routed to the local process for serving.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ServiceRequestFrame {
    /// Service name.
    pub service: String,
    /// Correlation id to echo in the response; absent callers get none.
    #[serde(default)]
    pub id: Option<String>,
    /// Request payload; null when the caller sent none.
    #[serde(default)]
    pub args: Value,
}

/// Reply to a service call we issued.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ServiceResponseFrame {
    /// Service name.
    pub service: String,
    /// Correlation id of the originating call.
    #[serde(default)]
    pub id: Option<String>,
    /// Success flag; a bridge that omits it did not claim success.
    #[serde(default)]
    pub result: bool,
    /// Response payload; null when omitted.
    #[serde(default)]
    pub values: Value,
}

/// Parse one frame of websocket text and classify it.
pub fn decode(text: &str) -> Result<Inbound, WireError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| WireError::malformed(err.to_string()))?;
    classify(value)
}

/// Classify an already-parsed frame by key presence.
pub fn classify(value: Value) -> Result<Inbound, WireError> {
    if value.get("topic").is_some() {
        let frame = serde_json::from_value(value)
            .map_err(|err| WireError::malformed(format!("bad topic frame: {err}")))?;
        return Ok(Inbound::Topic(frame));
    }
    if value.get("service").is_some() {
        if value.get("op").and_then(Value::as_str) == Some("call_service") {
            let frame = serde_json::from_value(value)
                .map_err(|err| WireError::malformed(format!("bad service request: {err}")))?;
            return Ok(Inbound::ServiceRequest(frame));
        }
        let frame = serde_json::from_value(value)
            .map_err(|err| WireError::malformed(format!("bad service response: {err}")))?;
        return Ok(Inbound::ServiceResponse(frame));
    }
    Err(WireError::malformed(
        "frame carries neither topic nor service",
    ))
}
