//! Notification routing for operator-facing messages.
//!
//! Selects delivery channels per message severity, adjusts priority and
//! delay per recipient, folds low-urgency messages into periodic digests,
//! pushes messages to live subscribers and collects human responses.
//!
//! # Main types
//!
//! - [`NotificationRouter`]: Entry point: `notify`, `handle_response`, `subscribe`.
//! - [`DeliveryChannel`]: Trait implemented by every delivery adapter.
//! - [`RoutingPolicy`]: Severity routes plus availability/urgency/expertise nudges.
//! - [`DigestBatcher`]: Time-bucketed accumulation of batchable messages.

/// Delivery adapters.
pub mod adapters;
/// Time-bucketed digest batching.
pub mod batch;
/// Delivery channel trait.
pub mod channel;
/// Router configuration.
pub mod config;
/// Human response types.
pub mod response;
/// The notification router.
pub mod router;
/// Route planning.
pub mod routing;

pub use adapters::{DiscordChannel, LogChannel, SlackChannel, TelegramChannel, WebhookChannel};
pub use batch::DigestBatcher;
pub use channel::{DeliveryChannel, DeliveryRecord};
pub use config::{
    BatchPolicy, ChannelRoute, NotificationConfig, QuietHours, RoutingTable, MAX_ROUTE_DELAY_SECS,
};
pub use response::{HumanFeedback, HumanResponse};
pub use router::{Disposition, NotificationRouter, NotifyOutcome};
pub use routing::{DeliveryPlan, RoutingPolicy};
