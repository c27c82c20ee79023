//! Action-protocol client built from five topic registrations.
//!
//! actionlib runs entirely over topics: goals and cancellations are
//! published, progress comes back on the feedback, result, and status
//! sub-topics. One [`ActionClient`] owns all five registrations for one
//! action server plus a table of live goals keyed by goal id. A goal is
//! evicted from the table as soon as its result is delivered; later
//! frames for that id take the unknown-goal path and are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use roslink_core::{ListenerToken, Result, goal_id};
use roslink_wire::TopicMessage;
use roslink_wire::action as protocol;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::Client;
use crate::handles::Publisher;
use crate::session::Command;

type Callback = Box<dyn Fn(&Value) + Send + Sync>;
type GoalTable = Arc<Mutex<HashMap<String, Arc<GoalCallbacks>>>>;

#[derive(Default)]
struct GoalCallbacks {
    feedback: Option<Callback>,
    result: Option<Callback>,
    status: Option<Callback>,
}

/// A goal payload plus its progress callbacks, handed to
/// [`ActionClient::send_goal`].
pub struct Goal {
    payload: Value,
    callbacks: GoalCallbacks,
}

impl Goal {
    /// Wrap a payload matching the action's `<Action>Goal` message type.
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            callbacks: GoalCallbacks::default(),
        }
    }

    /// Run `f` on the `feedback` field of every feedback frame for this
    /// goal. Runs on the action client's dispatch task; keep it quick.
    #[must_use]
    pub fn on_feedback(mut self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.callbacks.feedback = Some(Box::new(f));
        self
    }

    /// Run `f` on the `result` field when the terminal result arrives.
    #[must_use]
    pub fn on_result(mut self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.callbacks.result = Some(Box::new(f));
        self
    }

    /// Run `f` on this goal's entry of each server status array.
    #[must_use]
    pub fn on_status(mut self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.callbacks.status = Some(Box::new(f));
        self
    }
}

/// Client for one action server.
pub struct ActionClient {
    server: String,
    goal_pub: Publisher,
    cancel_pub: Publisher,
    goals: GoalTable,
    dispatch: JoinHandle<()>,
    commands: mpsc::Sender<Command>,
    listeners: Vec<(String, ListenerToken)>,
}

impl ActionClient {
    /// Register the action topology for `server` (e.g. `/fibonacci`) with
    /// action type `action_type` (e.g.
    /// `actionlib_tutorials/FibonacciAction`).
    pub async fn new(client: &Client, server: &str, action_type: &str) -> Result<Self> {
        let goal_pub = client
            .advertise(
                &protocol::goal_topic(server),
                &protocol::goal_msg_type(action_type),
            )
            .await?;
        let cancel_pub = client
            .advertise(&protocol::cancel_topic(server), protocol::CANCEL_MSG_TYPE)
            .await?;

        // One queue for all three inbound sub-topics keeps cross-topic
        // arrival order, so a result is never handled before the feedback
        // that preceded it.
        let (tx, rx) = mpsc::channel(client.config().topic_queue_capacity);
        let mut listeners = Vec::with_capacity(3);
        for (topic, msg_type) in [
            (
                protocol::feedback_topic(server),
                protocol::feedback_msg_type(action_type),
            ),
            (
                protocol::result_topic(server),
                protocol::result_msg_type(action_type),
            ),
            (
                protocol::status_topic(server),
                protocol::STATUS_MSG_TYPE.to_string(),
            ),
        ] {
            let token = client
                .subscribe_with_sender(&topic, &msg_type, tx.clone())
                .await?;
            listeners.push((topic, token));
        }

        let goals: GoalTable = Arc::new(Mutex::new(HashMap::new()));
        let dispatch = tokio::spawn(dispatch(server.to_string(), rx, goals.clone()));

        Ok(Self {
            server: server.to_string(),
            goal_pub,
            cancel_pub,
            goals,
            dispatch,
            commands: client.commands(),
            listeners,
        })
    }

    /// Send a goal. Returns the assigned goal id, usable for cancellation
    /// and tracking.
    pub async fn send_goal(&self, goal: Goal) -> Result<String> {
        let id = goal_id();
        {
            let mut goals = self.goals.lock();
            let _ = goals.insert(id.clone(), Arc::new(goal.callbacks));
        }
        let frame = protocol::goal_envelope(&id, goal.payload);
        if let Err(err) = self.goal_pub.publish(frame).await {
            let _ = self.goals.lock().remove(&id);
            return Err(err);
        }
        Ok(id)
    }

    /// Ask the server to cancel `goal_id`. The goal stays tracked until
    /// its result frame arrives; cancellation confirmation comes back
    /// asynchronously as a status or result.
    pub async fn cancel_goal(&self, goal_id: &str) -> Result<()> {
        self.cancel_pub
            .publish(protocol::cancel_envelope(goal_id))
            .await
    }

    /// Whether `goal_id` is still in the goal table, i.e. no result has
    /// been delivered for it yet.
    #[must_use]
    pub fn is_tracking(&self, goal_id: &str) -> bool {
        self.goals.lock().contains_key(goal_id)
    }

    /// Action server this client talks to.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }
}

impl Drop for ActionClient {
    fn drop(&mut self) {
        self.dispatch.abort();
        for (topic, token) in self.listeners.drain(..) {
            let _ = self.commands.try_send(Command::Unsubscribe { topic, token });
        }
    }
}

// ─── Dispatch ────────────────────────────────────────────────────────────

async fn dispatch(server: String, mut rx: mpsc::Receiver<TopicMessage>, goals: GoalTable) {
    let feedback_topic = protocol::feedback_topic(&server);
    let result_topic = protocol::result_topic(&server);
    let status_topic = protocol::status_topic(&server);

    while let Some(delivery) = rx.recv().await {
        if delivery.topic == feedback_topic {
            on_feedback(&goals, &delivery.msg);
        } else if delivery.topic == result_topic {
            on_result(&goals, &delivery.msg);
        } else if delivery.topic == status_topic {
            on_status(&goals, &delivery.msg);
        }
    }
}

fn on_feedback(goals: &GoalTable, msg: &Value) {
    let Some(id) = protocol::update_goal_id(msg) else {
        debug!("feedback frame without a goal id dropped");
        return;
    };
    let callbacks = goals.lock().get(id).cloned();
    let Some(callbacks) = callbacks else {
        debug!(goal = id, "feedback for unknown goal ignored");
        return;
    };
    if let Some(cb) = &callbacks.feedback {
        cb(&msg["feedback"]);
    }
}

fn on_result(goals: &GoalTable, msg: &Value) {
    let Some(id) = protocol::update_goal_id(msg) else {
        debug!("result frame without a goal id dropped");
        return;
    };
    // Terminal: evict before the callback so reentrant lookups already
    // see the goal gone.
    let removed = goals.lock().remove(id);
    let Some(callbacks) = removed else {
        debug!(goal = id, "result for unknown goal ignored");
        return;
    };
    if let Some(cb) = &callbacks.result {
        cb(&msg["result"]);
    }
}

fn on_status(goals: &GoalTable, msg: &Value) {
    let Some(id) = protocol::status_list_goal_id(msg) else {
        return;
    };
    let callbacks = goals.lock().get(id).cloned();
    let Some(callbacks) = callbacks else {
        return;
    };
    if let Some(cb) = &callbacks.status {
        cb(&msg["status_list"][0]);
    }
}
