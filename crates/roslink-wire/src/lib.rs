//! # roslink-wire
//!
//! rosbridge v2 wire-format types and codec:
//! - [`ClientOp`] tagged enum for every frame the client sends
//! - [`Inbound`] classification of frames the bridge sends back
//! - actionlib envelope helpers (goal wrapping, status codes, sub-topic naming)
//!
//! Frames are JSON objects carried as UTF-8 websocket text frames. Inbound
//! classification goes by key presence (`topic` vs `service`), not by `op`
//! alone, because some bridge versions omit the `op` field on responses.

#![deny(unsafe_code)]

pub mod action;
pub mod inbound;
pub mod ops;

pub use action::GoalStatus;
pub use inbound::{Inbound, ServiceRequestFrame, ServiceResponseFrame, TopicMessage};
pub use ops::ClientOp;

/// Codec failures. Decode failures are recoverable: the session drops the
/// frame and stays open.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Frame text was not valid JSON, or parsed into an unclassifiable shape.
    #[error("malformed frame: {detail}")]
    Malformed {
        /// What the parser objected to.
        detail: String,
    },

    /// An outbound operation could not be serialized.
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl WireError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}
