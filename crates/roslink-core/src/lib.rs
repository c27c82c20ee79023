//! # roslink-core
//!
//! Foundation types for the roslink rosbridge client.
//!
//! This crate provides the shared vocabulary the other roslink crates depend on:
//!
//! - **Identifiers**: the per-session [`IdGenerator`] behind every correlation
//!   id, plus registration tokens and goal-id generation
//! - **Errors**: the [`ClientError`] taxonomy via `thiserror`
//! - **Reconnect policy**: [`ReconnectPolicy`] and the backoff math
//! - **Configuration**: [`ClientConfig`] with sane rosbridge defaults
//! - **Logging**: a one-call `tracing` subscriber setup for binaries and tests

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod reconnect;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use ids::{IdGenerator, IdRole, ListenerToken, PublisherToken, ServiceToken, goal_id};
pub use reconnect::ReconnectPolicy;
