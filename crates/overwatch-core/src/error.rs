use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the Overwatch orchestrator.
///
/// The first five variants are the operational taxonomy: each one is
/// contained to a single task/agent pair or channel and surfaced as a
/// message. The remaining variants cover startup validation and API misuse.
#[derive(Error, Debug)]
pub enum OverwatchError {
    /// A decision was requested for an agent kind that is not registered or is disabled.
    #[error("Unknown agent kind: {0}")]
    UnknownAgent(String),

    /// A quality checker is registered or behaves inconsistently.
    #[error("Checker misconfiguration: {0}")]
    CheckerMisconfiguration(String),

    /// The opaque task-performing step failed.
    #[error("Execution failure: {0}")]
    ExecutionFailure(String),

    /// One delivery channel failed to deliver a message.
    #[error("Delivery failure on channel '{channel}': {reason}")]
    DeliveryFailure {
        /// Name of the failing channel.
        channel: String,
        /// Reason reported by the adapter.
        reason: String,
    },

    /// An operation exceeded its time budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid static configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A task submission was rejected.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// An agent operation needs the agent to be free of work.
    #[error("Agent busy: {0}")]
    AgentBusy(String),

    /// No task with this id is known.
    #[error("Unknown task: {0}")]
    UnknownTask(Uuid),

    /// No message with this id is awaiting a response.
    #[error("Unknown message: {0}")]
    UnknownMessage(Uuid),

    /// A human response does not match the message it answers.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`OverwatchError`].
pub type OverwatchResult<T> = Result<T, OverwatchError>;

impl OverwatchError {
    /// Build a [`OverwatchError::DeliveryFailure`].
    pub fn delivery(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailure {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}
