//! Outbound frames: everything this client ever sends to the bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::WireError;

/// One outbound rosbridge operation, serialized with an `"op"` tag.
///
/// Correlation ids are allocated by the caller; this layer never invents
/// them. `ServiceResponse` doubles as outbound when the local process is the
/// one serving a `call_service` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientOp {
    /// Declare intent to publish on a topic.
    Advertise {
        /// Correlation id (`advertise:<topic>:<n>`).
        id: String,
        /// Topic name.
        topic: String,
        /// ROS message type.
        #[serde(rename = "type")]
        msg_type: String,
        /// Whether the bridge should latch the last message.
        latch: bool,
        /// Outgoing queue size hint for the bridge.
        queue_size: u32,
    },

    /// Withdraw a previous advertise.
    Unadvertise {
        /// The id the advertise was sent with.
        id: String,
        /// Topic name.
        topic: String,
    },

    /// Publish one message on an advertised topic.
    Publish {
        /// Correlation id (`publish:<topic>:<n>`).
        id: String,
        /// Topic name.
        topic: String,
        /// Message payload.
        msg: Value,
    },

    /// Ask the bridge to forward a topic to us.
    Subscribe {
        /// Correlation id (`subscribe:<topic>:<n>`).
        id: String,
        /// Topic name.
        topic: String,
        /// ROS message type.
        #[serde(rename = "type")]
        msg_type: String,
    },

    /// Withdraw a previous subscribe.
    Unsubscribe {
        /// The id the subscribe was sent with.
        id: String,
        /// Topic name.
        topic: String,
    },

    /// Invoke a remote service.
    CallService {
        /// Correlation id (`service_client:<service>:<n>`).
        id: String,
        /// Service name.
        service: String,
        /// Request payload.
        args: Value,
    },

    /// Answer a `call_service` request the bridge routed to us.
    ServiceResponse {
        /// Service name.
        service: String,
        /// Correlation id echoed from the request, when it carried one.
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Whether the handler succeeded.
        result: bool,
        /// Response payload.
        values: Value,
    },

    /// rosauth credentials frame.
    Auth {
        /// SHA-512 MAC over the concatenated auth fields, hex-encoded.
        mac: String,
        /// Client IP as the auth server will see it.
        client: String,
        /// Destination host the client believes it connected to.
        dest: String,
        /// Hex nonce included in the MAC.
        rand: String,
        /// Timestamp seconds (0 when the server does not verify freshness).
        t: u64,
        /// Requested privilege level.
        level: String,
        /// Validity end seconds (0 when unused).
        end: u64,
    },
}

impl ClientOp {
    /// Serialize to the JSON text carried by one websocket frame.
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The `"op"` tag this frame serializes with.
    #[must_use]
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Advertise { .. } => "advertise",
            Self::Unadvertise { .. } => "unadvertise",
            Self::Publish { .. } => "publish",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::CallService { .. } => "call_service",
            Self::ServiceResponse { .. } => "service_response",
            Self::Auth { .. } => "auth",
        }
    }
}
