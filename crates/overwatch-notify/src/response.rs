use chrono::{DateTime, Utc};
use overwatch_core::ActionKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A human's answer to an actionable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanResponse {
    pub action: ActionKind,
    /// JSON object merged into the task context on `modify`.
    #[serde(default)]
    pub modifications: Option<serde_json::Value>,
    #[serde(default)]
    pub responder: Option<String>,
}

impl HumanResponse {
    pub fn approve() -> Self {
        Self {
            action: ActionKind::Approve,
            modifications: None,
            responder: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            action: ActionKind::Reject,
            modifications: None,
            responder: None,
        }
    }

    pub fn modify(modifications: serde_json::Value) -> Self {
        Self {
            action: ActionKind::Modify,
            modifications: Some(modifications),
            responder: None,
        }
    }

    pub fn by(mut self, responder: impl Into<String>) -> Self {
        self.responder = Some(responder.into());
        self
    }
}

/// A validated response, linked to the task its message referred to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanFeedback {
    pub message_id: Uuid,
    pub task_id: Option<Uuid>,
    pub response: HumanResponse,
    pub received_at: DateTime<Utc>,
}
