//! RAII handles returned by [`Client`](crate::Client) registration calls.
//!
//! Each handle owns one registration token. Dropping a handle posts the
//! matching withdrawal command; the session dedups at the wire level, so
//! the bridge only hears about the last one out.

use std::time::Duration;

use roslink_core::{ClientError, ListenerToken, PublisherToken, Result, ServiceToken};
use roslink_wire::TopicMessage;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::calls::ServiceReply;
use crate::client::Client;
use crate::session::Command;

/// Knobs for [`Client::advertise_with`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvertiseOptions {
    /// Ask the bridge to latch the last message for late subscribers.
    pub latch: bool,
    /// Bridge-side outgoing queue length for this topic.
    pub queue_size: u32,
}

impl Default for AdvertiseOptions {
    fn default() -> Self {
        Self {
            latch: false,
            queue_size: 100,
        }
    }
}

// ─── Subscriber ──────────────────────────────────────────────────────────

/// One subscription's message stream.
///
/// Dropping it withdraws this listener. The wire registration is released
/// only when the last listener on the topic is gone.
#[derive(Debug)]
pub struct Subscriber {
    topic: String,
    token: ListenerToken,
    rx: mpsc::Receiver<TopicMessage>,
    commands: mpsc::Sender<Command>,
}

impl Subscriber {
    pub(crate) fn new(
        topic: String,
        token: ListenerToken,
        rx: mpsc::Receiver<TopicMessage>,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            topic,
            token,
            rx,
            commands,
        }
    }

    /// Next delivery, or `None` once the session has closed.
    pub async fn next(&mut self) -> Option<TopicMessage> {
        self.rx.recv().await
    }

    /// Topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        // Best effort: a full command queue loses the withdrawal, and the
        // session then drops this listener on its next delivery attempt.
        let _ = self.commands.try_send(Command::Unsubscribe {
            topic: self.topic.clone(),
            token: self.token,
        });
    }
}

// ─── Publisher ───────────────────────────────────────────────────────────

/// Publishing rights on one advertised topic.
pub struct Publisher {
    topic: String,
    token: PublisherToken,
    commands: mpsc::Sender<Command>,
}

impl Publisher {
    pub(crate) fn new(topic: String, token: PublisherToken, commands: mpsc::Sender<Command>) -> Self {
        Self {
            topic,
            token,
            commands,
        }
    }

    /// Publish one message on the advertised topic.
    pub async fn publish(&self, msg: Value) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.commands
            .send(Command::Publish {
                topic: self.topic.clone(),
                token: self.token,
                msg,
                ack,
            })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    /// Topic this publisher advertises.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        let _ = self.commands.try_send(Command::Unadvertise {
            topic: self.topic.clone(),
            token: self.token,
        });
    }
}

// ─── ServiceClient ───────────────────────────────────────────────────────

/// Reusable caller handle bound to one service name.
#[derive(Clone)]
pub struct ServiceClient {
    service: String,
    client: Client,
    timeout: Duration,
}

impl ServiceClient {
    pub(crate) fn new(service: String, client: Client, timeout: Duration) -> Self {
        Self {
            service,
            client,
            timeout,
        }
    }

    /// Call the service with the handle's default timeout.
    pub async fn call(&self, args: Value) -> Result<ServiceReply> {
        self.call_with_timeout(args, self.timeout).await
    }

    /// Call the service with an explicit deadline.
    pub async fn call_with_timeout(&self, args: Value, timeout: Duration) -> Result<ServiceReply> {
        self.client
            .call_service_with_timeout(&self.service, args, timeout)
            .await
    }

    /// Service this handle calls.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}

// ─── ServiceServer ───────────────────────────────────────────────────────

/// Registration of a local service handler. Dropping it unregisters the
/// handler; inbound calls after that are ignored.
pub struct ServiceServer {
    service: String,
    token: ServiceToken,
    commands: mpsc::Sender<Command>,
}

impl ServiceServer {
    pub(crate) fn new(service: String, token: ServiceToken, commands: mpsc::Sender<Command>) -> Self {
        Self {
            service,
            token,
            commands,
        }
    }

    /// Service this handler serves.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Drop for ServiceServer {
    fn drop(&mut self) {
        let _ = self.commands.try_send(Command::UnregisterService {
            service: self.service.clone(),
            token: self.token,
        });
    }
}
