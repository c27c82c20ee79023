//! Identifier generation for sessions, registrations, and goals.
//!
//! Every outstanding operation on a session carries a correlation id built
//! from a role prefix, the resource name, and a strictly increasing numeric
//! id: `"subscribe:/robot/test:7"`. The bridge echoes these ids back verbatim;
//! nothing ever parses the structure, it only has to be unique per session.
//!
//! Goal ids are different: they must be unique across client instances (the
//! status topic is shared by every client of an action server), so they are
//! random UUIDs with a `goal_` prefix.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Numeric id generator
// ─────────────────────────────────────────────────────────────────────────────

/// Per-session source of strictly increasing numeric ids, starting at 1.
///
/// A `u64` counter bumped with `fetch_add` never reuses a value for the
/// lifetime of the session and never wraps in practice.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a generator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Take the next numeric id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Compose a correlation id for `role` on `resource`,
    /// e.g. `"subscribe:/robot/test:7"`.
    pub fn correlation_id(&self, role: IdRole, resource: &str) -> String {
        format!("{}:{}:{}", role.as_str(), resource, self.next_id())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Role prefix of a correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRole {
    /// Topic advertisement.
    Advertise,
    /// Topic subscription.
    Subscribe,
    /// Topic publish.
    Publish,
    /// Outbound service call.
    ServiceCall,
}

impl IdRole {
    /// The wire prefix for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Advertise => "advertise",
            Self::Subscribe => "subscribe",
            Self::Publish => "publish",
            Self::ServiceCall => "service_client",
        }
    }
}

impl fmt::Display for IdRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration tokens
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! registration_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a numeric id from the session's [`IdGenerator`].
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// The underlying numeric id.
            #[must_use]
            pub fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

registration_token! {
    /// Identifies one listener within a topic subscription entry.
    ListenerToken
}

registration_token! {
    /// Identifies one publisher within a topic advertisement entry.
    ///
    /// The numeric value doubles as the publisher's wire id: publish frames
    /// carry `publish:<topic>:<value>`.
    PublisherToken
}

registration_token! {
    /// Identifies one registered local service handler.
    ServiceToken
}

// ─────────────────────────────────────────────────────────────────────────────
// Goal ids
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a goal id: `goal_` plus a random UUID.
///
/// Goal ids must be unique across client instances, not just within one
/// session, because every client of an action server sees the same status
/// stream.
#[must_use]
pub fn goal_id() -> String {
    format!("goal_{}", Uuid::new_v4())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
