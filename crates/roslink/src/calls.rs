//! Call correlator: pending outbound calls and local service handlers.
//!
//! Outbound calls are keyed by correlation id and resolved exactly once; a
//! duplicate or unmatched response is logged and dropped. Inbound
//! `call_service` requests are served by handlers looked up by service name.

use std::collections::HashMap;
use std::sync::Arc;

use roslink_core::{ClientError, IdGenerator, IdRole, Result, ServiceToken};
use roslink_wire::{ClientOp, ServiceResponseFrame};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Outcome of a service call.
#[derive(Clone, Debug)]
pub struct ServiceReply {
    /// Success flag reported by the responder.
    pub result: bool,
    /// Response payload; null when the responder sent none.
    pub values: Value,
}

/// Handler for inbound service requests: request payload in, success flag
/// and response payload out. Runs on the session task, so it must not block.
pub(crate) type ServiceHandler = Arc<dyn Fn(Value) -> (bool, Value) + Send + Sync>;

struct PendingCall {
    service: String,
    reply: oneshot::Sender<Result<ServiceReply>>,
}

struct RegisteredService {
    token: ServiceToken,
    handler: ServiceHandler,
}

/// Correlator state owned by the session loop.
#[derive(Default)]
pub(crate) struct CallTable {
    pending: HashMap<String, PendingCall>,
    handlers: HashMap<String, RegisteredService>,
}

impl CallTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ─── Outbound calls ──────────────────────────────────────────────────

    /// Register a pending call and build its `call_service` frame.
    pub(crate) fn begin(
        &mut self,
        ids: &IdGenerator,
        service: &str,
        args: Value,
        reply: oneshot::Sender<Result<ServiceReply>>,
    ) -> ClientOp {
        let id = ids.correlation_id(IdRole::ServiceCall, service);
        let _ = self.pending.insert(
            id.clone(),
            PendingCall {
                service: service.to_string(),
                reply,
            },
        );
        ClientOp::CallService {
            id,
            service: service.to_string(),
            args,
        }
    }

    /// Drop a pending call without resolving it, handing back the reply slot.
    /// Used when the frame never made it onto the wire.
    pub(crate) fn abort(&mut self, id: &str) -> Option<oneshot::Sender<Result<ServiceReply>>> {
        self.pending.remove(id).map(|call| call.reply)
    }

    /// Resolve the pending call matching a `service_response` frame. At most
    /// one resolution per id; anything unmatched is logged and dropped.
    pub(crate) fn resolve(&mut self, frame: ServiceResponseFrame) {
        let Some(id) = frame.id else {
            warn!(service = %frame.service, "service response without id dropped");
            return;
        };
        let Some(call) = self.pending.remove(&id) else {
            warn!(%id, service = %frame.service, "unmatched service response dropped");
            return;
        };
        debug!(%id, service = %call.service, result = frame.result, "service call resolved");
        let reply = ServiceReply {
            result: frame.result,
            values: frame.values,
        };
        if call.reply.send(Ok(reply)).is_err() {
            debug!(%id, "service caller went away before the response");
        }
    }

    /// Fail every pending call. Used at teardown and on connection loss so
    /// callers are never left dangling.
    pub(crate) fn fail_all(&mut self, make_error: impl Fn() -> ClientError) {
        for (id, call) in self.pending.drain() {
            debug!(%id, service = %call.service, "failing pending call");
            let _ = call.reply.send(Err(make_error()));
        }
    }

    // ─── Local service handlers ──────────────────────────────────────────

    /// Register a handler. A handler already registered under the same name
    /// is replaced; the returned flag reports whether that happened.
    pub(crate) fn register(
        &mut self,
        ids: &IdGenerator,
        service: &str,
        handler: ServiceHandler,
    ) -> (ServiceToken, bool) {
        let token = ServiceToken::new(ids.next_id());
        let replaced = self
            .handlers
            .insert(service.to_string(), RegisteredService { token, handler })
            .is_some();
        (token, replaced)
    }

    /// Remove a handler if the token still owns it. Unknown service or a
    /// stale token is a no-op.
    pub(crate) fn unregister(&mut self, service: &str, token: ServiceToken) -> bool {
        match self.handlers.get(service) {
            Some(registered) if registered.token == token => {
                let _ = self.handlers.remove(service);
                true
            }
            _ => {
                debug!(service, %token, "unregister for unknown service handler ignored");
                false
            }
        }
    }

    /// Look up the handler serving a service name.
    pub(crate) fn lookup(&self, service: &str) -> Option<ServiceHandler> {
        self.handlers
            .get(service)
            .map(|registered| Arc::clone(&registered.handler))
    }
}
