use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Severity of an operator-facing [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSeverity {
    /// Routine progress.
    Info,
    /// Something degraded but contained.
    Warning,
    /// A human decision is needed before work continues.
    ActionRequired,
    /// A failure that needs immediate attention.
    Critical,
    /// A task finished successfully.
    Success,
}

impl MessageSeverity {
    /// Relative urgency, used when several messages are folded into one digest.
    pub fn urgency_rank(self) -> u8 {
        match self {
            MessageSeverity::Success => 0,
            MessageSeverity::Info => 1,
            MessageSeverity::Warning => 2,
            MessageSeverity::ActionRequired => 3,
            MessageSeverity::Critical => 4,
        }
    }

    /// Whether the router may fold this severity into a digest.
    pub fn is_batchable(self) -> bool {
        matches!(self, MessageSeverity::Info | MessageSeverity::Warning)
    }
}

impl std::fmt::Display for MessageSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageSeverity::Info => write!(f, "info"),
            MessageSeverity::Warning => write!(f, "warning"),
            MessageSeverity::ActionRequired => write!(f, "action_required"),
            MessageSeverity::Critical => write!(f, "critical"),
            MessageSeverity::Success => write!(f, "success"),
        }
    }
}

/// Component that produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The task orchestrator.
    Orchestrator,
    /// The decision engine.
    DecisionEngine,
    /// The quality gate pipeline.
    QualityGate,
    /// The notification router itself (digests, routing events).
    Router,
    /// An upstream collaborator outside this subsystem.
    External,
}

/// What pressing an action button means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Resume autonomous execution.
    Approve,
    /// Merge modifications into the task and requeue it.
    Modify,
    /// Cancel the task permanently.
    Reject,
    /// Dismiss without changing state.
    Acknowledge,
}

/// A response option attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAction {
    /// Stable identifier echoed back by the responding surface.
    pub id: String,
    /// Human-readable button label.
    pub label: String,
    /// Semantic meaning of the action.
    pub kind: ActionKind,
}

impl MessageAction {
    /// Create an action.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }

    /// The approve / modify / reject trio attached to escalations.
    pub fn escalation_set() -> Vec<MessageAction> {
        vec![
            MessageAction::new("approve", "Approve", ActionKind::Approve),
            MessageAction::new("modify", "Modify", ActionKind::Modify),
            MessageAction::new("reject", "Reject", ActionKind::Reject),
        ]
    }
}

/// A structured status event addressed to human operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: Uuid,
    /// Producing component.
    pub source: SourceKind,
    /// Severity, drives channel selection.
    pub severity: MessageSeverity,
    /// One-line summary.
    pub title: String,
    /// Longer description.
    pub body: String,
    /// Arbitrary key-value metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Response options, empty for purely informational messages.
    #[serde(default)]
    pub actions: Vec<MessageAction>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with no metadata or actions.
    pub fn new(
        source: SourceKind,
        severity: MessageSeverity,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            severity,
            title: title.into(),
            body: body.into(),
            metadata: HashMap::new(),
            actions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach a response action.
    pub fn with_action(mut self, action: MessageAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Attach several response actions.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = MessageAction>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Override the creation timestamp (used with injected clocks).
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Link the message to a task via the `task_id` metadata key.
    pub fn for_task(self, task_id: Uuid) -> Self {
        self.with_metadata("task_id", serde_json::Value::String(task_id.to_string()))
    }

    /// The task this message refers to, if any.
    pub fn task_id(&self) -> Option<Uuid> {
        self.metadata
            .get("task_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Find an attached action by id.
    pub fn action(&self, id: &str) -> Option<&MessageAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Plain-text rendering used by text-only channels.
    pub fn render_text(&self) -> String {
        let mut text = format!("[{}] {}", self.severity, self.title);
        if !self.body.is_empty() {
            text.push('\n');
            text.push_str(&self.body);
        }
        if !self.actions.is_empty() {
            let labels: Vec<&str> = self.actions.iter().map(|a| a.label.as_str()).collect();
            text.push_str(&format!("\nActions: {}", labels.join(" / ")));
        }
        text
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_round_trip() {
        let task_id = Uuid::new_v4();
        let msg = Message::new(
            SourceKind::Orchestrator,
            MessageSeverity::ActionRequired,
            "Escalated",
            "needs review",
        )
        .for_task(task_id);
        assert_eq!(msg.task_id(), Some(task_id));
    }

    #[test]
    fn test_escalation_set() {
        let msg = Message::new(SourceKind::Orchestrator, MessageSeverity::ActionRequired, "t", "")
            .with_actions(MessageAction::escalation_set());
        assert_eq!(msg.actions.len(), 3);
        assert_eq!(msg.action("modify").unwrap().kind, ActionKind::Modify);
        assert!(msg.action("snooze").is_none());
    }

    #[test]
    fn test_render_text() {
        let msg = Message::new(SourceKind::QualityGate, MessageSeverity::Warning, "Gate", "2 suggestions")
            .with_action(MessageAction::new("ack", "Acknowledge", ActionKind::Acknowledge));
        let text = msg.render_text();
        assert!(text.starts_with("[warning] Gate"));
        assert!(text.contains("2 suggestions"));
        assert!(text.contains("Actions: Acknowledge"));
    }

    #[test]
    fn test_batchable_severities() {
        assert!(MessageSeverity::Info.is_batchable());
        assert!(MessageSeverity::Warning.is_batchable());
        assert!(!MessageSeverity::Critical.is_batchable());
        assert!(!MessageSeverity::ActionRequired.is_batchable());
        assert!(!MessageSeverity::Success.is_batchable());
    }

    #[test]
    fn test_serialization() {
        let msg = Message::new(SourceKind::Router, MessageSeverity::Success, "done", "");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"severity\":\"success\""));
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, msg.id);
    }
}
