use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
    /// Failed execution or stuck; needs a restart.
    Error,
    /// Taken out of scheduling by an operator.
    Disabled,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Error => write!(f, "error"),
            AgentStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// A worker identity with a capability kind and adaptive scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub kind: String,
    pub status: AgentStatus,
    pub autonomy_level: f64,
    pub performance_score: f64,
    pub last_action_time: DateTime<Utc>,
    /// Only set while `status == Busy`.
    pub current_task: Option<Uuid>,
}

impl Agent {
    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }

    /// Bind the agent to a task.
    pub fn occupy(&mut self, task_id: Uuid, now: DateTime<Utc>) {
        self.status = AgentStatus::Busy;
        self.current_task = Some(task_id);
        self.last_action_time = now;
    }

    /// Release the agent back to `Idle`.
    pub fn release(&mut self, now: DateTime<Utc>) {
        self.status = AgentStatus::Idle;
        self.current_task = None;
        self.last_action_time = now;
    }

    /// Force the agent to `Error`, dropping its task binding.
    pub fn fault(&mut self, now: DateTime<Utc>) {
        self.status = AgentStatus::Error;
        self.current_task = None;
        self.last_action_time = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A unit of work owned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: String,
    pub priority: Priority,
    pub dependencies: Vec<Uuid>,
    /// Opaque domain payload handed to the executor and the quality gate.
    pub context: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Agent currently or last executing the task.
    #[serde(default)]
    pub assigned_agent: Option<String>,
    /// Decision that led to the current or last assignment.
    #[serde(default)]
    pub decision_id: Option<Uuid>,
    /// Escalation message awaiting a human response.
    #[serde(default)]
    pub awaiting_response: Option<Uuid>,
    /// A human approved the task; escalation no longer applies.
    #[serde(default)]
    pub human_approved: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl Task {
    pub fn is_awaiting_human(&self) -> bool {
        self.awaiting_response.is_some()
    }

    pub(crate) fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

/// A request to enqueue a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Pre-assigned id, so other submissions can depend on this task
    /// before it exists.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub kind: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    #[serde(default)]
    pub context: serde_json::Value,
}

fn default_priority() -> Priority {
    Priority::Medium
}

impl TaskSubmission {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            priority: Priority::Medium,
            dependencies: Vec::new(),
            context: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, dependency: Uuid) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}
