//! Coordinated teardown for a fleet of clients.
//!
//! Applications that hold several bridge sessions register them here and
//! shut them all down at exit, either politely ([`SessionManager::close_all`])
//! or with a deadline ([`SessionManager::stop`]).

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::Client;

/// Default patience for [`SessionManager::stop`].
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracks a set of clients so they can be shut down together.
#[derive(Default)]
pub struct SessionManager {
    clients: Mutex<Vec<Client>>,
}

impl SessionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `client` for coordinated shutdown.
    pub fn add(&self, client: Client) {
        self.clients.lock().push(client);
    }

    /// Number of tracked clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether any clients are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Close every tracked client gracefully, one at a time: release
    /// frames go out, sockets close, pending calls fail.
    pub async fn close_all(&self) {
        let clients: Vec<Client> = self.clients.lock().drain(..).collect();
        if clients.is_empty() {
            return;
        }
        info!(count = clients.len(), "closing sessions");
        for client in clients {
            client.close().await;
        }
    }

    /// Cancel every session and wait up to `timeout` for the tasks to
    /// finish their graceful teardown; stragglers are aborted. `None`
    /// waits indefinitely.
    pub async fn stop(&self, timeout: Option<Duration>) {
        let clients: Vec<Client> = self.clients.lock().drain(..).collect();
        if clients.is_empty() {
            return;
        }
        info!(count = clients.len(), "stopping sessions");

        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for client in &clients {
            client.cancel_token().cancel();
            if let Some(handle) = client.take_task() {
                handles.push(handle);
            }
        }
        let abort_handles: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        let join_all = futures::future::join_all(handles);
        match timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, join_all).await.is_err() {
                    warn!(?timeout, "sessions did not stop in time, aborting them");
                    for handle in abort_handles {
                        handle.abort();
                    }
                }
            }
            None => {
                let _ = join_all.await;
            }
        }
    }

    /// Wait for every tracked session to end on its own terms, without
    /// cancelling anything. The manager releases its own handles first, so
    /// a session whose last owner was the manager shuts down gracefully
    /// instead of being waited on forever.
    pub async fn join(&self) {
        let clients: Vec<Client> = self.clients.lock().drain(..).collect();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for client in &clients {
            if let Some(handle) = client.take_task() {
                handles.push(handle);
            }
        }
        drop(clients);
        let _ = futures::future::join_all(handles).await;
    }
}
