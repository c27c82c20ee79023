//! Topic registry: ref-counted wire registrations and listener fan-out.
//!
//! The registry is the single owner of the "is this topic already active"
//! decision. The first subscriber for a topic produces the wire `subscribe`
//! frame; later subscribers share it. The last one out produces the
//! `unsubscribe`. Advertisements work the same way with a ref-count of
//! publisher handles. Un-operations are idempotent: an unknown token is a
//! no-op and never double-sends the wire frame.

use std::collections::HashMap;

use roslink_core::{ClientError, IdGenerator, IdRole, ListenerToken, PublisherToken, Result};
use roslink_wire::{ClientOp, TopicMessage};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::handles::AdvertiseOptions;

/// One topic the session is subscribed to on the wire.
struct Subscription {
    msg_type: String,
    wire_id: String,
    /// Fan-out targets in registration order.
    listeners: Vec<Listener>,
}

struct Listener {
    token: ListenerToken,
    tx: mpsc::Sender<TopicMessage>,
}

/// One topic the session has advertised on the wire.
struct Advertisement {
    msg_type: String,
    options: AdvertiseOptions,
    wire_id: String,
    publishers: Vec<PublisherToken>,
}

/// Registry state owned by the session loop.
#[derive(Default)]
pub(crate) struct TopicTable {
    subs: HashMap<String, Subscription>,
    adverts: HashMap<String, Advertisement>,
}

impl TopicTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ─── Subscriptions ───────────────────────────────────────────────────

    /// Add a listener. Returns the wire `subscribe` frame only for the first
    /// listener on a topic.
    pub(crate) fn subscribe(
        &mut self,
        ids: &IdGenerator,
        topic: &str,
        msg_type: &str,
        tx: mpsc::Sender<TopicMessage>,
    ) -> (ListenerToken, Option<ClientOp>) {
        let token = ListenerToken::new(ids.next_id());
        if let Some(sub) = self.subs.get_mut(topic) {
            if sub.msg_type != msg_type {
                warn!(
                    topic,
                    registered = %sub.msg_type,
                    requested = %msg_type,
                    "subscriber type differs from the live subscription; keeping the original"
                );
            }
            sub.listeners.push(Listener { token, tx });
            return (token, None);
        }

        let wire_id = ids.correlation_id(IdRole::Subscribe, topic);
        let frame = ClientOp::Subscribe {
            id: wire_id.clone(),
            topic: topic.to_string(),
            msg_type: msg_type.to_string(),
        };
        let _ = self.subs.insert(
            topic.to_string(),
            Subscription {
                msg_type: msg_type.to_string(),
                wire_id,
                listeners: vec![Listener { token, tx }],
            },
        );
        (token, Some(frame))
    }

    /// Remove a listener. Returns the wire `unsubscribe` frame only when the
    /// last listener leaves. Unknown topic or token is a no-op.
    pub(crate) fn unsubscribe(&mut self, topic: &str, token: ListenerToken) -> Option<ClientOp> {
        let sub = self.subs.get_mut(topic)?;
        let before = sub.listeners.len();
        sub.listeners.retain(|listener| listener.token != token);
        if sub.listeners.len() == before {
            debug!(topic, %token, "unsubscribe for unknown listener ignored");
            return None;
        }
        if !sub.listeners.is_empty() {
            return None;
        }
        let sub = self.subs.remove(topic)?;
        Some(ClientOp::Unsubscribe {
            id: sub.wire_id,
            topic: topic.to_string(),
        })
    }

    /// Fan a delivery out to every listener for the topic, in registration
    /// order. A full or closed listener queue drops the message for that
    /// listener only.
    pub(crate) fn dispatch(&self, frame: &TopicMessage) {
        let Some(sub) = self.subs.get(&frame.topic) else {
            debug!(topic = %frame.topic, "delivery for topic with no listeners dropped");
            return;
        };
        for listener in &sub.listeners {
            if listener.tx.try_send(frame.clone()).is_err() {
                warn!(
                    topic = %frame.topic,
                    token = %listener.token,
                    "listener queue full or closed, message dropped for it"
                );
            }
        }
    }

    // ─── Advertisements ──────────────────────────────────────────────────

    /// Add a publisher. Returns the wire `advertise` frame only for the
    /// first publisher on a topic.
    pub(crate) fn advertise(
        &mut self,
        ids: &IdGenerator,
        topic: &str,
        msg_type: &str,
        options: AdvertiseOptions,
    ) -> (PublisherToken, Option<ClientOp>) {
        let token = PublisherToken::new(ids.next_id());
        if let Some(advert) = self.adverts.get_mut(topic) {
            if advert.msg_type != msg_type {
                warn!(
                    topic,
                    registered = %advert.msg_type,
                    requested = %msg_type,
                    "publisher type differs from the live advertisement; keeping the original"
                );
            }
            advert.publishers.push(token);
            return (token, None);
        }

        let wire_id = ids.correlation_id(IdRole::Advertise, topic);
        let frame = ClientOp::Advertise {
            id: wire_id.clone(),
            topic: topic.to_string(),
            msg_type: msg_type.to_string(),
            latch: options.latch,
            queue_size: options.queue_size,
        };
        let _ = self.adverts.insert(
            topic.to_string(),
            Advertisement {
                msg_type: msg_type.to_string(),
                options,
                wire_id,
                publishers: vec![token],
            },
        );
        (token, Some(frame))
    }

    /// Remove a publisher. Returns the wire `unadvertise` frame only when
    /// the last publisher leaves. Unknown topic or token is a no-op.
    pub(crate) fn unadvertise(&mut self, topic: &str, token: PublisherToken) -> Option<ClientOp> {
        let advert = self.adverts.get_mut(topic)?;
        let before = advert.publishers.len();
        advert.publishers.retain(|held| *held != token);
        if advert.publishers.len() == before {
            debug!(topic, %token, "unadvertise for unknown publisher ignored");
            return None;
        }
        if !advert.publishers.is_empty() {
            return None;
        }
        let advert = self.adverts.remove(topic)?;
        Some(ClientOp::Unadvertise {
            id: advert.wire_id,
            topic: topic.to_string(),
        })
    }

    /// Build the `publish` frame for a held publisher token. The frame id is
    /// stable per publisher (`publish:<topic>:<token>`).
    pub(crate) fn publish_frame(
        &self,
        topic: &str,
        token: PublisherToken,
        msg: Value,
    ) -> Result<ClientOp> {
        let live = self
            .adverts
            .get(topic)
            .is_some_and(|advert| advert.publishers.contains(&token));
        if !live {
            return Err(ClientError::anomaly(format!(
                "publish on {topic} with no live advertisement"
            )));
        }
        Ok(ClientOp::Publish {
            id: format!("{}:{topic}:{}", IdRole::Publish.as_str(), token.value()),
            topic: topic.to_string(),
            msg,
        })
    }

    // ─── Session lifecycle ───────────────────────────────────────────────

    /// Frames re-establishing every live registration on a fresh socket,
    /// reusing the original correlation ids.
    pub(crate) fn replay_frames(&self) -> Vec<ClientOp> {
        let mut frames = Vec::with_capacity(self.adverts.len() + self.subs.len());
        for (topic, advert) in &self.adverts {
            frames.push(ClientOp::Advertise {
                id: advert.wire_id.clone(),
                topic: topic.clone(),
                msg_type: advert.msg_type.clone(),
                latch: advert.options.latch,
                queue_size: advert.options.queue_size,
            });
        }
        for (topic, sub) in &self.subs {
            frames.push(ClientOp::Subscribe {
                id: sub.wire_id.clone(),
                topic: topic.clone(),
                msg_type: sub.msg_type.clone(),
            });
        }
        frames
    }

    /// Frames withdrawing every live registration, then clear the tables.
    /// Dropping the listener senders ends every subscriber stream.
    pub(crate) fn release_frames(&mut self) -> Vec<ClientOp> {
        let mut frames = Vec::with_capacity(self.subs.len() + self.adverts.len());
        for (topic, sub) in self.subs.drain() {
            frames.push(ClientOp::Unsubscribe {
                id: sub.wire_id,
                topic,
            });
        }
        for (topic, advert) in self.adverts.drain() {
            frames.push(ClientOp::Unadvertise {
                id: advert.wire_id,
                topic,
            });
        }
        frames
    }
}
