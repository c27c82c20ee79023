//! Session lifecycle notifications.

use std::fmt;
use std::time::Duration;

/// Lifecycle notification from a session, delivered on the broadcast stream
/// returned by [`Client::events`](crate::Client::events).
///
/// Termination arrives as a final event: [`SessionEvent::Closed`] for an
/// explicit close or exhausted retries, [`SessionEvent::AuthRejected`] for
/// the reserved auth-failure close. To await termination itself, use
/// [`Client::closed`](crate::Client::closed); buffered events stay readable
/// after it resolves.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// Socket handshake completed; fires on the first connect and on every
    /// reopen after a reconnect.
    Opened,
    /// The link went away, by remote close, socket error, or local close.
    Closed {
        /// Websocket close code, when the peer sent a close frame.
        code: Option<u16>,
        /// Close reason text, possibly empty.
        reason: String,
    },
    /// A reconnect attempt has been scheduled.
    Reconnecting {
        /// 1-based number of the upcoming attempt within this outage.
        attempt: u32,
        /// Backoff delay before the attempt.
        delay: Duration,
    },
    /// The bridge closed the session with the reserved auth-failure code.
    /// Terminal: no reconnect follows.
    AuthRejected {
        /// Close reason supplied by the bridge, possibly empty.
        reason: String,
    },
}

/// Where the session currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress (initial connect).
    Connecting,
    /// Link open, frames flowing.
    Open,
    /// Link lost, backoff timer armed.
    Reconnecting,
    /// Graceful teardown in progress.
    Closing,
    /// Session over; handles fail fast.
    Closed,
}

impl ConnectionState {
    /// Short lowercase name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
