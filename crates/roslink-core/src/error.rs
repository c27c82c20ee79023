//! Error taxonomy for the roslink client.
//!
//! One flat enum covers every failure a caller can observe. Anomalies that
//! the session absorbs (malformed frames, unmatched response ids, calls for
//! unregistered services) are logged where they happen and only surface as
//! [`ClientError::ProtocolAnomaly`] when an operation has a caller to tell.

use serde_json::Value;
use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Everything that can go wrong talking to a bridge server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An operation needed an open socket and the session is not Open.
    #[error("not connected to the bridge")]
    NotConnected,

    /// The socket closed or reset while the operation was outstanding.
    #[error("connection to the bridge was lost")]
    ConnectionLost,

    /// The bridge closed the session with the reserved auth-failure code.
    /// Automatic reconnect is disabled for this session.
    #[error("authentication rejected by the bridge: {reason}")]
    AuthenticationRejected {
        /// Close reason supplied by the bridge, possibly empty.
        reason: String,
    },

    /// A frame or operation violated the protocol contract. Recoverable;
    /// the session stays open.
    #[error("protocol anomaly: {detail}")]
    ProtocolAnomaly {
        /// What was malformed or unexpected.
        detail: String,
    },

    /// A deadline-bound wait elapsed. The underlying call stays registered
    /// and a late response is discarded silently.
    #[error("timed out after {timeout_ms} ms waiting for {operation}")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// Websocket handshake or socket-level failure.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying transport error text.
        message: String,
    },

    /// Local JSON encoding failed.
    #[error("failed to encode frame: {detail}")]
    Encode {
        /// Serializer error text.
        detail: String,
    },

    /// A service responded with `result: false`.
    #[error("service {service} reported failure")]
    ServiceFailure {
        /// The service that failed.
        service: String,
        /// The `values` payload from the response frame.
        values: Value,
    },
}

impl ClientError {
    /// Build a [`ClientError::ProtocolAnomaly`].
    pub fn anomaly(detail: impl Into<String>) -> Self {
        Self::ProtocolAnomaly {
            detail: detail.into(),
        }
    }

    /// Build a [`ClientError::Transport`].
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Build a [`ClientError::Encode`].
    pub fn encode(detail: impl std::fmt::Display) -> Self {
        Self::Encode {
            detail: detail.to_string(),
        }
    }

    /// Build a [`ClientError::Timeout`].
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Whether the failure is tied to the connection rather than the
    /// operation itself, i.e. retrying after a reopen could succeed.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionLost | Self::Transport { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
