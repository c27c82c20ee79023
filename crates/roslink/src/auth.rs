//! rosauth session authentication.
//!
//! The bridge's auth extension checks a SHA-512 MAC over the secret, the
//! client and destination addresses, a nonce, and the time/level/end
//! fields, concatenated in protocol order. This client always stamps
//! `t = 0` and `end = 0`; bridges running without the auth extension
//! ignore the frame entirely, so sending it is never harmful.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use roslink_core::{ClientError, Result};
use roslink_wire::ClientOp;
use sha2::{Digest, Sha512};
use tracing::warn;

/// Close code the bridge uses to reject a bad MAC. Terminal: the session
/// does not reconnect after it.
pub const AUTH_REJECT_CLOSE_CODE: u16 = 1008;

/// Source of the client address that goes into the MAC.
///
/// The bridge recomputes the MAC with the address it sees the connection
/// coming from, so the resolver must produce that same address.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// The address the bridge will see this client as.
    async fn resolve(&self) -> Result<String>;
}

/// Resolves the public address through an HTTP echo service that returns
/// it as plain text.
pub struct HttpIpResolver {
    url: String,
    timeout: Duration,
}

impl HttpIpResolver {
    /// Point at an echo service such as `https://api.ipify.org`.
    #[must_use]
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| ClientError::transport(err.to_string()))?;
        let body = client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| ClientError::transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| ClientError::transport(err.to_string()))?
            .text()
            .await
            .map_err(|err| ClientError::transport(err.to_string()))?;
        Ok(body.trim().to_string())
    }
}

/// Fixed address, for clients that already know how the bridge sees them.
pub struct StaticIpResolver(pub String);

#[async_trait]
impl IpResolver for StaticIpResolver {
    async fn resolve(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

// ─── Frame construction ──────────────────────────────────────────────────

/// Hex SHA-512 over the fields in protocol order, times rendered as
/// decimal strings.
pub(crate) fn compute_mac(
    secret: &str,
    client: &str,
    dest: &str,
    rand: &str,
    t: u64,
    level: &str,
    end: u64,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(secret.as_bytes());
    hasher.update(client.as_bytes());
    hasher.update(dest.as_bytes());
    hasher.update(rand.as_bytes());
    hasher.update(t.to_string().as_bytes());
    hasher.update(level.as_bytes());
    hasher.update(end.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn nonce() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Build the `auth` frame for `secret` with a fresh nonce.
pub(crate) fn auth_frame(secret: &str, client_ip: &str, dest: &str, level: &str) -> ClientOp {
    let rand = nonce();
    let mac = compute_mac(secret, client_ip, dest, &rand, 0, level, 0);
    ClientOp::Auth {
        mac,
        client: client_ip.to_string(),
        dest: dest.to_string(),
        rand,
        t: 0,
        level: level.to_string(),
        end: 0,
    }
}

/// Host part of a websocket URL: scheme, port, and path stripped, IPv6
/// brackets unwrapped.
pub(crate) fn dest_host(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    if let Some(inner) = authority.strip_prefix('[') {
        if let Some((host, _)) = inner.split_once(']') {
            return host.to_string();
        }
    }
    authority
        .split_once(':')
        .map_or(authority, |(host, _)| host)
        .to_string()
}

/// First line of the secret file, trimmed. Missing, unreadable, or empty
/// files yield `None` so callers can fall back to unauthenticated mode
/// with the same invocation.
pub(crate) fn read_secret_file(path: &Path) -> Option<String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "secret file not usable, skipping auth");
            return None;
        }
    };
    let secret = contents.lines().next().unwrap_or("").trim();
    if secret.is_empty() {
        warn!(path = %path.display(), "secret file is empty, skipping auth");
        return None;
    }
    Some(secret.to_string())
}
