//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::reconnect::ReconnectPolicy;

/// Configuration for one bridge connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bridge websocket URL (default `"ws://127.0.0.1:9090"`).
    pub url: String,
    /// Reconnect behavior after an unexpected close.
    pub reconnect: ReconnectPolicy,
    /// Command channel capacity between handles and the session loop.
    pub command_capacity: usize,
    /// Per-listener inbound message buffer; overflow drops for that listener.
    pub topic_queue_capacity: usize,
    /// Session event broadcast buffer.
    pub event_capacity: usize,
    /// Default deadline for convenience service calls in ms.
    pub call_timeout_ms: u64,
    /// Privilege level sent in the auth frame.
    pub auth_level: String,
    /// Externally visible IP of this client. When set, authentication skips
    /// the HTTP resolver entirely.
    pub client_ip: Option<String>,
    /// HTTP endpoint returning the caller's public IP as plain text.
    pub ip_service_url: String,
    /// Deadline for the public-IP lookup in ms.
    pub ip_resolve_timeout_ms: u64,
}

impl ClientConfig {
    /// Configuration for `url` with defaults for everything else.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9090".into(),
            reconnect: ReconnectPolicy::default(),
            command_capacity: 128,
            topic_queue_capacity: 256,
            event_capacity: 64,
            call_timeout_ms: 5000,
            auth_level: "user".into(),
            client_ip: None,
            ip_service_url: "https://api.ipify.org".into(),
            ip_resolve_timeout_ms: 5000,
        }
    }
}
