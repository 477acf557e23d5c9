use async_trait::async_trait;
use chrono::{DateTime, Utc};
use overwatch_core::{Message, OverwatchResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A delivery adapter for one kind of channel.
///
/// Adapters are swappable without touching routing; a failure on one channel
/// never prevents delivery on the others.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Name used by routes to reference this channel.
    fn name(&self) -> &str;
    async fn send(&self, message: &Message) -> OverwatchResult<()>;
}

/// Outcome of one channel attempt, kept as a routing-layer event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub message_id: Uuid,
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub priority: u8,
    pub at: DateTime<Utc>,
}
