//! The session actor: one task owning the socket, the topic registry, and
//! the call correlator.
//!
//! Handles never touch the socket. They post [`Command`]s on a channel and
//! await acks; the loop serializes everything, so inbound frames for one
//! session are processed strictly in arrival order and no lock is shared
//! across tasks. Reconnection is a state of this same loop (a timer arm in
//! the select), never recursion from a close handler.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use roslink_core::{
    ClientConfig, ClientError, IdGenerator, ListenerToken, PublisherToken, Result, ServiceToken,
};
use roslink_wire::inbound::ServiceRequestFrame;
use roslink_wire::{self as wire, ClientOp, Inbound, TopicMessage};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::AUTH_REJECT_CLOSE_CODE;
use crate::calls::{CallTable, ServiceHandler, ServiceReply};
use crate::event::{ConnectionState, SessionEvent};
use crate::handles::AdvertiseOptions;
use crate::topics::TopicTable;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// One request from a handle to the session loop.
pub(crate) enum Command {
    Subscribe {
        topic: String,
        msg_type: String,
        tx: mpsc::Sender<TopicMessage>,
        ack: oneshot::Sender<Result<ListenerToken>>,
    },
    Unsubscribe {
        topic: String,
        token: ListenerToken,
    },
    Advertise {
        topic: String,
        msg_type: String,
        options: AdvertiseOptions,
        ack: oneshot::Sender<Result<PublisherToken>>,
    },
    Unadvertise {
        topic: String,
        token: PublisherToken,
    },
    Publish {
        topic: String,
        token: PublisherToken,
        msg: Value,
        ack: oneshot::Sender<Result<()>>,
    },
    CallService {
        service: String,
        args: Value,
        reply: oneshot::Sender<Result<ServiceReply>>,
    },
    RegisterService {
        service: String,
        handler: ServiceHandler,
        ack: oneshot::Sender<Result<ServiceToken>>,
    },
    UnregisterService {
        service: String,
        token: ServiceToken,
    },
    Authenticate {
        frame: ClientOp,
        ack: oneshot::Sender<Result<()>>,
    },
    SendRaw {
        text: String,
        ack: oneshot::Sender<Result<()>>,
    },
    Close {
        ack: oneshot::Sender<()>,
    },
}

/// Everything the session loop owns.
pub(crate) struct SessionContext {
    pub(crate) config: ClientConfig,
    pub(crate) ids: IdGenerator,
    pub(crate) topics: TopicTable,
    pub(crate) calls: CallTable,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    pub(crate) state: watch::Sender<ConnectionState>,
}

impl SessionContext {
    pub(crate) fn new(
        config: ClientConfig,
        events: broadcast::Sender<SessionEvent>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            config,
            ids: IdGenerator::new(),
            topics: TopicTable::new(),
            calls: CallTable::new(),
            events,
            state,
        }
    }
}

/// Session loop. Runs until explicit close, cancellation, the last handle
/// dropping, auth rejection, or exhausted reconnect attempts.
pub(crate) async fn run(
    mut ctx: SessionContext,
    ws: WsStream,
    mut commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) {
    let (tx, rx) = ws.split();
    let mut ws_tx = Some(tx);
    let mut ws_rx = Some(rx);
    let mut attempts: u32 = 0;
    let mut retry_at: Option<Instant> = None;

    let _ = ctx.state.send(ConnectionState::Open);
    let _ = ctx.events.send(SessionEvent::Opened);
    info!(url = %ctx.config.url, "session open");

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                shutdown(&mut ctx, &mut ws_tx).await;
                break;
            }

            cmd = commands.recv() => {
                match cmd {
                    None => {
                        debug!("all handles dropped, closing session");
                        shutdown(&mut ctx, &mut ws_tx).await;
                        break;
                    }
                    Some(Command::Close { ack }) => {
                        shutdown(&mut ctx, &mut ws_tx).await;
                        let _ = ack.send(());
                        break;
                    }
                    Some(cmd) => {
                        if let Err(err) = handle_command(cmd, &mut ctx, &mut ws_tx).await {
                            warn!(error = %err, "send failed, dropping link");
                            let reason = err.to_string();
                            if !lose_link(&mut ctx, &mut ws_tx, &mut ws_rx, None, reason, attempts, &mut retry_at) {
                                break;
                            }
                        }
                    }
                }
            }

            frame = next_frame(&mut ws_rx) => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(err) = handle_frame(text.as_str(), &mut ctx, &mut ws_tx).await {
                            warn!(error = %err, "send failed, dropping link");
                            let reason = err.to_string();
                            if !lose_link(&mut ctx, &mut ws_tx, &mut ws_rx, None, reason, attempts, &mut retry_at) {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("binary frame from the bridge dropped");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(close))) => {
                        let code = close.as_ref().map(|frame| u16::from(frame.code));
                        let reason = close
                            .map(|frame| frame.reason.to_string())
                            .unwrap_or_default();
                        if code == Some(AUTH_REJECT_CLOSE_CODE) {
                            warn!(%reason, "authentication rejected by the bridge, not reconnecting");
                            ws_tx = None;
                            ws_rx = None;
                            ctx.calls.fail_all(|| ClientError::AuthenticationRejected {
                                reason: reason.clone(),
                            });
                            let _ = ctx.events.send(SessionEvent::AuthRejected { reason });
                            break;
                        }
                        info!(?code, %reason, "bridge closed the connection");
                        if !lose_link(&mut ctx, &mut ws_tx, &mut ws_rx, code, reason, attempts, &mut retry_at) {
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "socket error");
                        let reason = err.to_string();
                        if !lose_link(&mut ctx, &mut ws_tx, &mut ws_rx, None, reason, attempts, &mut retry_at) {
                            break;
                        }
                    }
                    None => {
                        let reason = String::from("connection reset by the bridge");
                        if !lose_link(&mut ctx, &mut ws_tx, &mut ws_rx, None, reason, attempts, &mut retry_at) {
                            break;
                        }
                    }
                }
            }

            () = sleep_until_retry(retry_at) => {
                retry_at = None;
                attempts += 1;
                match reopen(&ctx, attempts).await {
                    Ok((tx, rx)) => {
                        attempts = 0;
                        ws_tx = Some(tx);
                        ws_rx = Some(rx);
                        if let Err(err) = replay(&mut ctx, &mut ws_tx).await {
                            warn!(error = %err, "registration replay failed, dropping link");
                            let reason = err.to_string();
                            if !lose_link(&mut ctx, &mut ws_tx, &mut ws_rx, None, reason, attempts, &mut retry_at) {
                                break;
                            }
                        } else {
                            let _ = ctx.state.send(ConnectionState::Open);
                            let _ = ctx.events.send(SessionEvent::Opened);
                            info!(url = %ctx.config.url, "session reopened");
                        }
                    }
                    Err(err) => {
                        warn!(attempt = attempts, error = %err, "reconnect attempt failed");
                        if !schedule_retry(&mut ctx, attempts, &mut retry_at) {
                            break;
                        }
                    }
                }
            }
        }
    }

    let _ = ctx.state.send(ConnectionState::Closed);
    debug!("session loop ended");
}

// ─── Select-arm futures ──────────────────────────────────────────────────

async fn next_frame(
    ws_rx: &mut Option<WsSource>,
) -> Option<std::result::Result<Message, tungstenite::Error>> {
    match ws_rx {
        Some(stream) => stream.next().await,
        // Link down: this arm sits out until reconnect restores the stream.
        None => std::future::pending().await,
    }
}

async fn sleep_until_retry(retry_at: Option<Instant>) {
    match retry_at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ─── Link lifecycle ──────────────────────────────────────────────────────

/// Drop the link, fail pending calls, announce the loss, and schedule a
/// retry. Returns `false` when the retry ceiling is exhausted and the
/// session must terminate.
#[allow(clippy::too_many_arguments)]
fn lose_link(
    ctx: &mut SessionContext,
    ws_tx: &mut Option<WsSink>,
    ws_rx: &mut Option<WsSource>,
    code: Option<u16>,
    reason: String,
    attempts: u32,
    retry_at: &mut Option<Instant>,
) -> bool {
    *ws_tx = None;
    *ws_rx = None;
    ctx.calls.fail_all(|| ClientError::ConnectionLost);
    let _ = ctx.events.send(SessionEvent::Closed { code, reason });
    schedule_retry(ctx, attempts, retry_at)
}

/// Arm the backoff timer for the next reconnect attempt. Returns `false`
/// when the consecutive-failure ceiling has been reached.
fn schedule_retry(
    ctx: &mut SessionContext,
    attempts: u32,
    retry_at: &mut Option<Instant>,
) -> bool {
    let policy = &ctx.config.reconnect;
    if attempts >= policy.max_retries {
        error!(
            attempts,
            max_retries = policy.max_retries,
            "reconnect attempts exhausted, session terminated"
        );
        return false;
    }
    let delay = policy.delay_for(attempts);
    *retry_at = Some(Instant::now() + delay);
    let _ = ctx.state.send(ConnectionState::Reconnecting);
    let _ = ctx.events.send(SessionEvent::Reconnecting {
        attempt: attempts + 1,
        delay,
    });
    info!(attempt = attempts + 1, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
    true
}

async fn reopen(ctx: &SessionContext, attempt: u32) -> Result<(WsSink, WsSource)> {
    info!(attempt, url = %ctx.config.url, "reconnecting");
    let (ws, _response) = connect_async(ctx.config.url.as_str())
        .await
        .map_err(|err| ClientError::transport(err.to_string()))?;
    Ok(ws.split())
}

/// Re-establish every live registration on a fresh socket.
async fn replay(ctx: &mut SessionContext, ws_tx: &mut Option<WsSink>) -> Result<()> {
    let frames = ctx.topics.replay_frames();
    if frames.is_empty() {
        return Ok(());
    }
    debug!(count = frames.len(), "replaying registrations");
    for frame in &frames {
        send_op(ws_tx, frame).await?;
    }
    Ok(())
}

/// Graceful teardown: withdraw registrations while the socket is still
/// usable, close it, and fail whatever is left pending.
async fn shutdown(ctx: &mut SessionContext, ws_tx: &mut Option<WsSink>) {
    let _ = ctx.state.send(ConnectionState::Closing);
    let release = ctx.topics.release_frames();
    if let Some(sink) = ws_tx.as_mut() {
        for frame in &release {
            match frame.encode() {
                Ok(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "release frame not encodable"),
            }
        }
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })))
            .await;
    }
    *ws_tx = None;
    ctx.calls.fail_all(|| ClientError::ConnectionLost);
    let _ = ctx.events.send(SessionEvent::Closed {
        code: Some(1000),
        reason: String::from("closed by client"),
    });
    info!("session closed");
}

// ─── Outbound ────────────────────────────────────────────────────────────

async fn send_op(ws_tx: &mut Option<WsSink>, op: &ClientOp) -> Result<()> {
    let text = op.encode().map_err(ClientError::encode)?;
    send_text(ws_tx, text).await
}

async fn send_text(ws_tx: &mut Option<WsSink>, text: String) -> Result<()> {
    let Some(sink) = ws_tx.as_mut() else {
        return Err(ClientError::NotConnected);
    };
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|err| ClientError::transport(err.to_string()))
}

// ─── Command dispatch ────────────────────────────────────────────────────

/// Apply one command. `Err` means the socket failed mid-send (the command
/// itself has already been acked); the loop runs its link-loss path.
async fn handle_command(
    cmd: Command,
    ctx: &mut SessionContext,
    ws_tx: &mut Option<WsSink>,
) -> Result<()> {
    match cmd {
        Command::Subscribe {
            topic,
            msg_type,
            tx,
            ack,
        } => {
            if ws_tx.is_none() {
                let _ = ack.send(Err(ClientError::NotConnected));
                return Ok(());
            }
            let (token, frame) = ctx.topics.subscribe(&ctx.ids, &topic, &msg_type, tx);
            if let Some(frame) = frame {
                if let Err(err) = send_op(ws_tx, &frame).await {
                    let _ = ctx.topics.unsubscribe(&topic, token);
                    let _ = ack.send(Err(ClientError::ConnectionLost));
                    return Err(err);
                }
            }
            let _ = ack.send(Ok(token));
            Ok(())
        }

        Command::Unsubscribe { topic, token } => {
            if let Some(frame) = ctx.topics.unsubscribe(&topic, token) {
                if ws_tx.is_some() {
                    send_op(ws_tx, &frame).await?;
                }
            }
            Ok(())
        }

        Command::Advertise {
            topic,
            msg_type,
            options,
            ack,
        } => {
            if ws_tx.is_none() {
                let _ = ack.send(Err(ClientError::NotConnected));
                return Ok(());
            }
            let (token, frame) = ctx.topics.advertise(&ctx.ids, &topic, &msg_type, options);
            if let Some(frame) = frame {
                if let Err(err) = send_op(ws_tx, &frame).await {
                    let _ = ctx.topics.unadvertise(&topic, token);
                    let _ = ack.send(Err(ClientError::ConnectionLost));
                    return Err(err);
                }
            }
            let _ = ack.send(Ok(token));
            Ok(())
        }

        Command::Unadvertise { topic, token } => {
            if let Some(frame) = ctx.topics.unadvertise(&topic, token) {
                if ws_tx.is_some() {
                    send_op(ws_tx, &frame).await?;
                }
            }
            Ok(())
        }

        Command::Publish {
            topic,
            token,
            msg,
            ack,
        } => {
            if ws_tx.is_none() {
                let _ = ack.send(Err(ClientError::NotConnected));
                return Ok(());
            }
            match ctx.topics.publish_frame(&topic, token, msg) {
                Ok(frame) => match send_op(ws_tx, &frame).await {
                    Ok(()) => {
                        let _ = ack.send(Ok(()));
                        Ok(())
                    }
                    Err(err) => {
                        let _ = ack.send(Err(ClientError::ConnectionLost));
                        Err(err)
                    }
                },
                Err(err) => {
                    let _ = ack.send(Err(err));
                    Ok(())
                }
            }
        }

        Command::CallService {
            service,
            args,
            reply,
        } => {
            if ws_tx.is_none() {
                let _ = reply.send(Err(ClientError::NotConnected));
                return Ok(());
            }
            let frame = ctx.calls.begin(&ctx.ids, &service, args, reply);
            if let Err(err) = send_op(ws_tx, &frame).await {
                if let ClientOp::CallService { id, .. } = &frame {
                    if let Some(slot) = ctx.calls.abort(id) {
                        let _ = slot.send(Err(ClientError::ConnectionLost));
                    }
                }
                return Err(err);
            }
            Ok(())
        }

        Command::RegisterService {
            service,
            handler,
            ack,
        } => {
            let (token, replaced) = ctx.calls.register(&ctx.ids, &service, handler);
            if replaced {
                warn!(service, "replacing the existing handler for this service");
            }
            let _ = ack.send(Ok(token));
            Ok(())
        }

        Command::UnregisterService { service, token } => {
            let _ = ctx.calls.unregister(&service, token);
            Ok(())
        }

        Command::Authenticate { frame, ack } => {
            if ws_tx.is_none() {
                let _ = ack.send(Err(ClientError::NotConnected));
                return Ok(());
            }
            match send_op(ws_tx, &frame).await {
                Ok(()) => {
                    info!("auth frame sent");
                    let _ = ack.send(Ok(()));
                    Ok(())
                }
                Err(err) => {
                    let _ = ack.send(Err(ClientError::ConnectionLost));
                    Err(err)
                }
            }
        }

        Command::SendRaw { text, ack } => {
            if ws_tx.is_none() {
                let _ = ack.send(Err(ClientError::NotConnected));
                return Ok(());
            }
            match send_text(ws_tx, text).await {
                Ok(()) => {
                    let _ = ack.send(Ok(()));
                    Ok(())
                }
                Err(err) => {
                    let _ = ack.send(Err(ClientError::ConnectionLost));
                    Err(err)
                }
            }
        }

        // Close is intercepted by the loop before dispatch.
        Command::Close { ack } => {
            let _ = ack.send(());
            Ok(())
        }
    }
}

// ─── Inbound dispatch ────────────────────────────────────────────────────

async fn handle_frame(
    text: &str,
    ctx: &mut SessionContext,
    ws_tx: &mut Option<WsSink>,
) -> Result<()> {
    match wire::inbound::decode(text) {
        Ok(Inbound::Topic(frame)) => {
            ctx.topics.dispatch(&frame);
            Ok(())
        }
        Ok(Inbound::ServiceResponse(frame)) => {
            ctx.calls.resolve(frame);
            Ok(())
        }
        Ok(Inbound::ServiceRequest(frame)) => serve_request(frame, ctx, ws_tx).await,
        Err(err) => {
            debug!(error = %err, "inbound frame dropped");
            Ok(())
        }
    }
}

/// Serve one inbound `call_service`. No registered handler means the frame
/// is ignored without a response.
async fn serve_request(
    frame: ServiceRequestFrame,
    ctx: &mut SessionContext,
    ws_tx: &mut Option<WsSink>,
) -> Result<()> {
    let Some(handler) = ctx.calls.lookup(&frame.service) else {
        debug!(service = %frame.service, "call for service with no local handler ignored");
        return Ok(());
    };
    let (result, values) = handler(frame.args);
    let response = ClientOp::ServiceResponse {
        service: frame.service,
        id: frame.id,
        result,
        values,
    };
    send_op(ws_tx, &response).await
}
