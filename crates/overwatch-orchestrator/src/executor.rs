use async_trait::async_trait;
use overwatch_core::OverwatchResult;
use overwatch_decision::Decision;
use serde::Serialize;
use uuid::Uuid;

/// Everything an executor gets to perform one task.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub task_id: Uuid,
    pub task_kind: String,
    pub agent_id: String,
    pub context: serde_json::Value,
    pub decision: Decision,
}

/// The opaque step that actually performs a task.
///
/// The returned JSON is merged over the task context before the quality
/// gate evaluates it, so executors report quality data under `quality`.
/// An `Err` is an execution failure: the task fails and the agent goes
/// to `Error`.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, assignment: &Assignment) -> OverwatchResult<serde_json::Value>;
}

/// Recursively merge `patch` into `target`. Objects merge key by key,
/// anything else replaces.
pub fn merge_json(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match (target, patch) {
        (serde_json::Value::Object(target), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
