use crate::channel::DeliveryChannel;
use async_trait::async_trait;
use overwatch_core::{Message, MessageSeverity, OverwatchResult};
use tracing::{error, info, warn};

/// Emits each message as a structured `tracing` event.
///
/// Default route target, so a router with no external channels still
/// leaves an audit trail.
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    pub fn new() -> Self {
        Self {
            name: "log".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> OverwatchResult<()> {
        let task_id = message.task_id().map(|id| id.to_string()).unwrap_or_default();
        match message.severity {
            MessageSeverity::Critical => error!(
                message_id = %message.id,
                task_id = %task_id,
                title = %message.title,
                body = %message.body,
                "Critical notification"
            ),
            MessageSeverity::Warning | MessageSeverity::ActionRequired => warn!(
                message_id = %message.id,
                task_id = %task_id,
                severity = %message.severity,
                title = %message.title,
                actions = message.actions.len(),
                "Notification"
            ),
            MessageSeverity::Info | MessageSeverity::Success => info!(
                message_id = %message.id,
                task_id = %task_id,
                severity = %message.severity,
                title = %message.title,
                "Notification"
            ),
        }
        Ok(())
    }
}
