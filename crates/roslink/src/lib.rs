//! # roslink
//!
//! rosbridge v2 websocket client runtime:
//! - [`Client`] connects to a bridge and owns one session actor
//! - [`Subscriber`]/[`Publisher`] handles share wire registrations per topic
//! - [`ServiceClient`] calls remote services; [`ServiceServer`] serves
//!   inbound `call_service` requests
//! - [`ActionClient`] drives actionlib goals over the five action sub-topics
//! - rosauth session authentication with a pluggable public-IP resolver
//! - bounded reconnection with registration replay
//!
//! # Architecture
//!
//! Each session is one tokio task owning the topic registry, the call
//! correlator, and the socket. Handles post commands on a channel and await
//! acks, so callers on any task never contend on shared state. Listener
//! delivery uses bounded channels with non-blocking sends; a slow consumer
//! drops its own messages, never the session's.

#![deny(unsafe_code)]

pub mod action;
pub mod auth;
pub mod client;
pub mod event;
pub mod handles;
pub mod manager;
pub mod rosapi;

mod calls;
mod session;
mod topics;

pub use action::{ActionClient, Goal};
pub use auth::{AUTH_REJECT_CLOSE_CODE, HttpIpResolver, IpResolver, StaticIpResolver};
pub use calls::ServiceReply;
pub use client::Client;
pub use event::{ConnectionState, SessionEvent};
pub use handles::{AdvertiseOptions, Publisher, ServiceClient, ServiceServer, Subscriber};
pub use manager::SessionManager;
pub use rosapi::{NodeDetails, RosApi};
pub use roslink_core::{ClientConfig, ClientError, ReconnectPolicy, Result};
pub use roslink_wire::{GoalStatus, TopicMessage};
