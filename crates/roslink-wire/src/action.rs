//! actionlib envelope helpers.
//!
//! An action server is five plain topics under one namespace. These helpers
//! name the sub-topics and their message types, wrap goal payloads in the
//! `ActionGoal` envelope, and dig goal ids back out of feedback, result, and
//! status messages.

use serde_json::{Value, json};

/// Message type of the cancel topic.
pub const CANCEL_MSG_TYPE: &str = "actionlib_msgs/GoalID";
/// Message type of the status topic.
pub const STATUS_MSG_TYPE: &str = "actionlib_msgs/GoalStatusArray";

/// Goal outcome codes from `actionlib_msgs/GoalStatus`. Codes outside the
/// set this client reacts to pass through as [`GoalStatus::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GoalStatus {
    /// Goal is being processed by the action server.
    Active,
    /// Goal was canceled after it started executing.
    Preempted,
    /// Goal was achieved.
    Succeeded,
    /// Goal was aborted by the action server.
    Aborted,
    /// Any other code, carried through untouched.
    Other(u8),
}

impl GoalStatus {
    /// Map a raw status code.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Active,
            2 => Self::Preempted,
            3 => Self::Succeeded,
            4 => Self::Aborted,
            other => Self::Other(other),
        }
    }

    /// The raw wire code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Active => 1,
            Self::Preempted => 2,
            Self::Succeeded => 3,
            Self::Aborted => 4,
            Self::Other(code) => code,
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Preempted => write!(f, "preempted"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Aborted => write!(f, "aborted"),
            Self::Other(code) => write!(f, "status({code})"),
        }
    }
}

// ── Sub-topic naming ────────────────────────────────────────────────

/// Goal topic under an action server namespace.
#[must_use]
pub fn goal_topic(server: &str) -> String {
    format!("{server}/goal")
}

/// Cancel topic under an action server namespace.
#[must_use]
pub fn cancel_topic(server: &str) -> String {
    format!("{server}/cancel")
}

/// Feedback topic under an action server namespace.
#[must_use]
pub fn feedback_topic(server: &str) -> String {
    format!("{server}/feedback")
}

/// Result topic under an action server namespace.
#[must_use]
pub fn result_topic(server: &str) -> String {
    format!("{server}/result")
}

/// Status topic under an action server namespace.
#[must_use]
pub fn status_topic(server: &str) -> String {
    format!("{server}/status")
}

/// Goal message type for an action type (`.../TestAction` → `.../TestActionGoal`).
#[must_use]
pub fn goal_msg_type(action_type: &str) -> String {
    format!("{action_type}Goal")
}

/// Feedback message type for an action type.
#[must_use]
pub fn feedback_msg_type(action_type: &str) -> String {
    format!("{action_type}Feedback")
}

/// Result message type for an action type.
#[must_use]
pub fn result_msg_type(action_type: &str) -> String {
    format!("{action_type}Result")
}

// ── Envelopes ───────────────────────────────────────────────────────

/// Wrap a goal payload in the `ActionGoal` envelope published on the goal
/// topic. The stamp is left at zero; action servers fill their own.
#[must_use]
pub fn goal_envelope(goal_id: &str, goal: Value) -> Value {
    json!({
        "goal_id": {
            "stamp": {"secs": 0, "nsecs": 0},
            "id": goal_id,
        },
        "goal": goal,
    })
}

/// `actionlib_msgs/GoalID` payload published on the cancel topic.
#[must_use]
pub fn cancel_envelope(goal_id: &str) -> Value {
    json!({"id": goal_id})
}

// ── Goal-id extraction ──────────────────────────────────────────────

/// Goal id inside a feedback or result message (`status.goal_id.id`).
#[must_use]
pub fn update_goal_id(msg: &Value) -> Option<&str> {
    msg.get("status")?.get("goal_id")?.get("id")?.as_str()
}

/// Status code inside a feedback or result message (`status.status`).
#[must_use]
pub fn update_status_code(msg: &Value) -> Option<u8> {
    let code = msg.get("status")?.get("status")?.as_u64()?;
    u8::try_from(code).ok()
}

/// Goal id of the first entry in a `GoalStatusArray`
/// (`status_list[0].goal_id.id`).
#[must_use]
pub fn status_list_goal_id(msg: &Value) -> Option<&str> {
    msg.get("status_list")?
        .get(0)?
        .get("goal_id")?
        .get("id")?
        .as_str()
}
