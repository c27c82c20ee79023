//! Public client handle. Cheap to clone; every clone talks to the same
//! session task.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use roslink_core::{ClientConfig, ClientError, ListenerToken, Result};
use roslink_wire::TopicMessage;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::auth::{self, HttpIpResolver, IpResolver};
use crate::calls::ServiceReply;
use crate::event::{ConnectionState, SessionEvent};
use crate::handles::{AdvertiseOptions, Publisher, ServiceClient, ServiceServer, Subscriber};
use crate::session::{self, Command, SessionContext};

/// Handle to one bridge session.
///
/// Obtained from [`Client::connect`] or [`Client::with_config`]. All methods
/// post to the session task and await its answer; none of them touch the
/// socket directly, so a `Client` can be cloned freely and used from any
/// task.
///
/// ```no_run
/// # async fn demo() -> roslink::Result<()> {
/// let client = roslink::Client::connect("ws://127.0.0.1:9090").await?;
/// let mut odom = client.subscribe("/odom", "nav_msgs/Odometry").await?;
/// while let Some(delivery) = odom.next().await {
///     println!("{}", delivery.msg);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    config: ClientConfig,
}

impl Client {
    /// Connect to a bridge with default settings.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(url)).await
    }

    /// Connect with explicit settings.
    pub async fn with_config(config: ClientConfig) -> Result<Self> {
        let (ws, _response) = connect_async(config.url.as_str())
            .await
            .map_err(|err| ClientError::transport(err.to_string()))?;

        let (commands, cmd_rx) = mpsc::channel(config.command_capacity);
        let (events, _) = broadcast::channel(config.event_capacity);
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        let ctx = SessionContext::new(config.clone(), events.clone(), state_tx);
        let task = tokio::spawn(session::run(ctx, ws, cmd_rx, cancel.clone()));

        Ok(Self {
            inner: Arc::new(ClientInner {
                commands,
                events,
                state,
                cancel,
                task: Mutex::new(Some(task)),
                config,
            }),
        })
    }

    // ─── Topics ──────────────────────────────────────────────────────────

    /// Subscribe to a topic. Concurrent subscriptions to the same topic
    /// share one wire registration; each subscriber still gets every
    /// message.
    pub async fn subscribe(&self, topic: &str, msg_type: &str) -> Result<Subscriber> {
        let (tx, rx) = mpsc::channel(self.inner.config.topic_queue_capacity);
        let token = self.subscribe_with_sender(topic, msg_type, tx).await?;
        Ok(Subscriber::new(
            topic.to_string(),
            token,
            rx,
            self.inner.commands.clone(),
        ))
    }

    /// Subscribe with a caller-owned delivery channel. Used by the action
    /// client to funnel several topics into one queue.
    pub(crate) async fn subscribe_with_sender(
        &self,
        topic: &str,
        msg_type: &str,
        tx: mpsc::Sender<TopicMessage>,
    ) -> Result<ListenerToken> {
        let (ack, rx) = oneshot::channel();
        self.post(Command::Subscribe {
            topic: topic.to_string(),
            msg_type: msg_type.to_string(),
            tx,
            ack,
        })
        .await?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    /// Advertise a topic with default options.
    pub async fn advertise(&self, topic: &str, msg_type: &str) -> Result<Publisher> {
        self.advertise_with(topic, msg_type, AdvertiseOptions::default())
            .await
    }

    /// Advertise a topic, controlling latching and the bridge-side queue.
    pub async fn advertise_with(
        &self,
        topic: &str,
        msg_type: &str,
        options: AdvertiseOptions,
    ) -> Result<Publisher> {
        let (ack, rx) = oneshot::channel();
        self.post(Command::Advertise {
            topic: topic.to_string(),
            msg_type: msg_type.to_string(),
            options,
            ack,
        })
        .await?;
        let token = rx.await.map_err(|_| ClientError::NotConnected)??;
        Ok(Publisher::new(
            topic.to_string(),
            token,
            self.inner.commands.clone(),
        ))
    }

    // ─── Services ────────────────────────────────────────────────────────

    /// Call a remote service and wait for its reply, up to the configured
    /// call timeout.
    pub async fn call_service(&self, service: &str, args: Value) -> Result<ServiceReply> {
        let timeout = Duration::from_millis(self.inner.config.call_timeout_ms);
        self.call_service_with_timeout(service, args, timeout).await
    }

    /// Call a remote service with an explicit deadline.
    pub async fn call_service_with_timeout(
        &self,
        service: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<ServiceReply> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::CallService {
            service: service.to_string(),
            args,
            reply,
        })
        .await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ClientError::NotConnected),
            Err(_) => Err(ClientError::timeout(
                format!("service call to {service}"),
                timeout.as_millis() as u64,
            )),
        }
    }

    /// Reusable handle for calling one service.
    #[must_use]
    pub fn service_client(&self, service: &str) -> ServiceClient {
        ServiceClient::new(
            service.to_string(),
            self.clone(),
            Duration::from_millis(self.inner.config.call_timeout_ms),
        )
    }

    /// Register a handler for inbound calls to `service`. The handler runs
    /// on the session task and must return quickly; its `(bool, Value)`
    /// return becomes the `service_response` result flag and values.
    ///
    /// Registering over an existing handler replaces it.
    pub async fn register_service<F>(&self, service: &str, handler: F) -> Result<ServiceServer>
    where
        F: Fn(Value) -> (bool, Value) + Send + Sync + 'static,
    {
        let (ack, rx) = oneshot::channel();
        self.post(Command::RegisterService {
            service: service.to_string(),
            handler: Arc::new(handler),
            ack,
        })
        .await?;
        let token = rx.await.map_err(|_| ClientError::NotConnected)??;
        Ok(ServiceServer::new(
            service.to_string(),
            token,
            self.inner.commands.clone(),
        ))
    }

    // ─── Authentication ──────────────────────────────────────────────────

    /// Send a rosauth `auth` frame built from `secret`.
    ///
    /// The client IP comes from the configured override, or from the
    /// configured IP echo service when no override is set. Rejection does
    /// not surface here: the bridge answers a bad MAC by closing the socket
    /// with code 1008, which arrives as
    /// [`SessionEvent::AuthRejected`](crate::SessionEvent::AuthRejected).
    pub async fn authenticate(&self, secret: &str) -> Result<()> {
        match &self.inner.config.client_ip {
            Some(ip) => self.send_auth(secret, ip).await,
            None => {
                let resolver = HttpIpResolver::new(
                    &self.inner.config.ip_service_url,
                    Duration::from_millis(self.inner.config.ip_resolve_timeout_ms),
                );
                self.authenticate_with_resolver(secret, &resolver).await
            }
        }
    }

    /// Authenticate, resolving the client IP through `resolver`.
    pub async fn authenticate_with_resolver(
        &self,
        secret: &str,
        resolver: &dyn IpResolver,
    ) -> Result<()> {
        let client_ip = resolver.resolve().await?;
        self.send_auth(secret, &client_ip).await
    }

    /// Authenticate from a secret file, if one is usable.
    ///
    /// A missing, unreadable, or empty file is not an error: it logs a
    /// warning and returns `Ok(false)` so unauthenticated bridges keep
    /// working with the same invocation. Returns `Ok(true)` once the auth
    /// frame has been sent.
    pub async fn authenticate_from_file(&self, path: &Path) -> Result<bool> {
        let Some(secret) = auth::read_secret_file(path) else {
            return Ok(false);
        };
        self.authenticate(&secret).await?;
        Ok(true)
    }

    async fn send_auth(&self, secret: &str, client_ip: &str) -> Result<()> {
        let dest = auth::dest_host(&self.inner.config.url);
        let frame = auth::auth_frame(secret, client_ip, &dest, &self.inner.config.auth_level);
        let (ack, rx) = oneshot::channel();
        self.post(Command::Authenticate { frame, ack }).await?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    // ─── Escape hatch ────────────────────────────────────────────────────

    /// Send an already-encoded frame verbatim. The text is forwarded as one
    /// websocket text frame with no inspection; callers are on their own
    /// for correlation ids.
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.post(Command::SendRaw {
            text: text.into(),
            ack,
        })
        .await?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Subscribe to session lifecycle events. Slow receivers lag rather
    /// than block the session.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Resolves once the session reaches [`ConnectionState::Closed`],
    /// whether by explicit close, auth rejection, or exhausted reconnect
    /// attempts.
    pub async fn closed(&self) {
        let mut state = self.inner.state.clone();
        loop {
            if *state.borrow_and_update() == ConnectionState::Closed {
                return;
            }
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Close the session: withdraw live registrations, close the socket,
    /// fail pending calls, and join the session task.
    pub async fn close(&self) {
        let (ack, rx) = oneshot::channel();
        if self.inner.commands.send(Command::Close { ack }).await.is_ok() {
            let _ = rx.await;
        }
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "session task did not exit cleanly");
            }
        }
    }

    // ─── Manager plumbing ────────────────────────────────────────────────

    pub(crate) fn commands(&self) -> mpsc::Sender<Command> {
        self.inner.commands.clone()
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub(crate) fn take_task(&self) -> Option<JoinHandle<()>> {
        self.inner.task.lock().take()
    }

    async fn post(&self, cmd: Command) -> Result<()> {
        self.inner
            .commands
            .send(cmd)
            .await
            .map_err(|_| ClientError::NotConnected)
    }
}
