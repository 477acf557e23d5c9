use chrono::{DateTime, Timelike, Utc};
use overwatch_core::{MessageSeverity, OverwatchError, OverwatchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One channel a severity is routed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRoute {
    /// Name of a registered [`crate::DeliveryChannel`].
    pub channel: String,
    /// Base priority, higher is more urgent.
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Base delay before delivery.
    #[serde(default)]
    pub delay_secs: u64,
    /// Recipient whose availability adjusts this route.
    #[serde(default)]
    pub recipient: Option<String>,
}

/// Longest base delay a route may configure.
pub const MAX_ROUTE_DELAY_SECS: u64 = 86_400;

fn default_priority() -> u8 {
    50
}

impl ChannelRoute {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            priority: default_priority(),
            delay_secs: 0,
            recipient: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay(mut self, delay_secs: u64) -> Self {
        self.delay_secs = delay_secs;
        self
    }

    pub fn for_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }
}

/// Ordered channel routes per severity.
///
/// Critical messages ignore this table and fan out to every registered channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingTable {
    pub info: Vec<ChannelRoute>,
    pub warning: Vec<ChannelRoute>,
    pub action_required: Vec<ChannelRoute>,
    pub critical: Vec<ChannelRoute>,
    pub success: Vec<ChannelRoute>,
}

impl RoutingTable {
    /// Send every severity to the same single channel.
    pub fn single(channel: &str) -> Self {
        let route = vec![ChannelRoute::new(channel)];
        Self {
            info: route.clone(),
            warning: route.clone(),
            action_required: route.clone(),
            critical: route.clone(),
            success: route,
        }
    }

    pub fn routes(&self, severity: MessageSeverity) -> &[ChannelRoute] {
        match severity {
            MessageSeverity::Info => &self.info,
            MessageSeverity::Warning => &self.warning,
            MessageSeverity::ActionRequired => &self.action_required,
            MessageSeverity::Critical => &self.critical,
            MessageSeverity::Success => &self.success,
        }
    }

    pub(crate) fn all_routes(&self) -> impl Iterator<Item = &ChannelRoute> {
        self.info
            .iter()
            .chain(&self.warning)
            .chain(&self.action_required)
            .chain(&self.critical)
            .chain(&self.success)
    }
}

/// UTC hour range, `start_hour` inclusive and `end_hour` exclusive.
/// Wraps past midnight when `start_hour > end_hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl QuietHours {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let hour = at.hour();
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// When Info/Warning messages are folded into digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
    pub enabled: bool,
    /// Width of one digest bucket.
    pub window_secs: u64,
    /// Batching is suspended inside these hours.
    pub quiet_hours: Option<QuietHours>,
    /// How often the digest timer checks for closed buckets.
    pub flush_interval_secs: u64,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: 300,
            quiet_hours: None,
            flush_interval_secs: 60,
        }
    }
}

/// Notification router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub routes: RoutingTable,
    pub batching: BatchPolicy,
    /// Availability in `[0, 1]` per recipient.
    pub availability: HashMap<String, f64>,
    pub default_availability: f64,
    /// Words marking a message as needing specialist attention.
    pub expertise_keywords: Vec<String>,
    pub expertise_priority_bonus: u8,
    pub delivery_timeout_secs: u64,
    pub recent_messages_capacity: usize,
    pub delivery_log_capacity: usize,
    pub live_buffer: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            routes: RoutingTable::single("log"),
            batching: BatchPolicy::default(),
            availability: HashMap::new(),
            default_availability: 0.5,
            expertise_keywords: [
                "geometry",
                "topology",
                "projection",
                "crs",
                "coordinate",
                "spatial index",
                "raster",
                "vulnerability",
                "migration",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            expertise_priority_bonus: 15,
            delivery_timeout_secs: 10,
            recent_messages_capacity: 200,
            delivery_log_capacity: 500,
            live_buffer: 256,
        }
    }
}

impl NotificationConfig {
    pub fn validate(&self) -> OverwatchResult<()> {
        if let Some(quiet) = self.batching.quiet_hours {
            if quiet.start_hour > 23 || quiet.end_hour > 23 {
                return Err(OverwatchError::Config(
                    "notifications.batching.quiet_hours must use hours 0-23".into(),
                ));
            }
        }
        if self.batching.enabled && self.batching.window_secs == 0 {
            return Err(OverwatchError::Config(
                "notifications.batching.window_secs must be positive".into(),
            ));
        }
        if let Some(route) = self
            .routes
            .all_routes()
            .find(|r| r.delay_secs > MAX_ROUTE_DELAY_SECS)
        {
            return Err(OverwatchError::Config(format!(
                "delay of route to '{}' exceeds {MAX_ROUTE_DELAY_SECS}s",
                route.channel
            )));
        }
        for (recipient, a) in &self.availability {
            if !(0.0..=1.0).contains(a) {
                return Err(OverwatchError::Config(format!(
                    "availability of '{recipient}' must be within [0, 1], got {a}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.default_availability) {
            return Err(OverwatchError::Config(
                "notifications.default_availability must be within [0, 1]".into(),
            ));
        }
        if self.recent_messages_capacity == 0 || self.delivery_log_capacity == 0 || self.live_buffer == 0
        {
            return Err(OverwatchError::Config(
                "notification buffer capacities must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 30, 0).single().unwrap_or_default()
    }

    #[test]
    fn test_quiet_hours_same_day() {
        let quiet = QuietHours { start_hour: 12, end_hour: 14 };
        assert!(quiet.contains(at_hour(12)));
        assert!(quiet.contains(at_hour(13)));
        assert!(!quiet.contains(at_hour(14)));
        assert!(!quiet.contains(at_hour(9)));
    }

    #[test]
    fn test_quiet_hours_wrap_midnight() {
        let quiet = QuietHours { start_hour: 22, end_hour: 7 };
        assert!(quiet.contains(at_hour(23)));
        assert!(quiet.contains(at_hour(3)));
        assert!(!quiet.contains(at_hour(7)));
        assert!(!quiet.contains(at_hour(15)));
    }

    #[test]
    fn test_validation() {
        assert!(NotificationConfig::default().validate().is_ok());
        let mut config = NotificationConfig::default();
        config.availability.insert("oncall".into(), 1.5);
        assert!(config.validate().is_err());

        let mut config = NotificationConfig::default();
        config.routes.info = vec![ChannelRoute::new("log").with_delay(u64::MAX)];
        assert!(config.validate().is_err());
        config.routes.info = vec![ChannelRoute::new("log").with_delay(MAX_ROUTE_DELAY_SECS)];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_routes_from_toml_shape() {
        let table: RoutingTable = serde_json::from_value(serde_json::json!({
            "critical": [{"channel": "slack", "priority": 90}],
            "info": [{"channel": "log", "delay_secs": 30, "recipient": "team"}]
        }))
        .unwrap_or_default();
        assert_eq!(table.routes(MessageSeverity::Critical)[0].priority, 90);
        assert_eq!(table.routes(MessageSeverity::Info)[0].delay_secs, 30);
        assert!(table.routes(MessageSeverity::Warning).is_empty());
    }
}
