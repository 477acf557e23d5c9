use crate::config::{ChannelRoute, NotificationConfig, MAX_ROUTE_DELAY_SECS};
use overwatch_core::{Message, MessageSeverity};
use regex::Regex;
use std::time::Duration;

/// A concrete delivery: which channel, how urgently, after how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPlan {
    pub channel: String,
    pub priority: u8,
    pub delay: Duration,
}

/// Turns a message into delivery plans.
///
/// The channel set comes from the severity's routes (or every registered
/// channel for a Critical fan-out). Availability, urgency and expertise
/// adjust priority and delay, never the channels.
pub struct RoutingPolicy {
    config: NotificationConfig,
    expertise: Option<Regex>,
}

impl RoutingPolicy {
    pub fn new(config: NotificationConfig) -> Self {
        let expertise = build_vocabulary(&config.expertise_keywords);
        Self { config, expertise }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Update a recipient's availability, clamped to `[0, 1]`.
    pub fn set_availability(&mut self, recipient: impl Into<String>, availability: f64) {
        self.config
            .availability
            .insert(recipient.into(), overwatch_core::clamp_unit(availability));
    }

    /// Whether title or body mentions the specialist vocabulary.
    pub fn requires_expertise(&self, message: &Message) -> bool {
        self.expertise
            .as_ref()
            .is_some_and(|re| re.is_match(&message.title) || re.is_match(&message.body))
    }

    /// Availability of a route's recipient in `[0, 1]`.
    pub fn availability(&self, route: &ChannelRoute) -> f64 {
        route
            .recipient
            .as_ref()
            .and_then(|r| self.config.availability.get(r))
            .copied()
            .unwrap_or(self.config.default_availability)
            .clamp(0.0, 1.0)
    }

    /// Delivery plans for the severity's routes, most urgent first.
    pub fn plan(&self, message: &Message) -> Vec<DeliveryPlan> {
        let expertise = self.requires_expertise(message);
        let mut plans: Vec<DeliveryPlan> = self
            .config
            .routes
            .routes(message.severity)
            .iter()
            .map(|route| self.adjust(route, message.severity, expertise))
            .collect();
        plans.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.channel.cmp(&b.channel)));
        plans
    }

    /// Plans covering every channel in `channels`.
    ///
    /// Used for Critical messages. Channels with a critical route keep that
    /// route's base priority, the rest get the default route.
    pub fn plan_fanout<'a>(
        &self,
        message: &Message,
        channels: impl IntoIterator<Item = &'a str>,
    ) -> Vec<DeliveryPlan> {
        let expertise = self.requires_expertise(message);
        let table = self.config.routes.routes(message.severity);
        let mut plans: Vec<DeliveryPlan> = channels
            .into_iter()
            .map(|name| {
                let route = table
                    .iter()
                    .find(|r| r.channel == name)
                    .cloned()
                    .unwrap_or_else(|| ChannelRoute::new(name));
                self.adjust(&route, message.severity, expertise)
            })
            .collect();
        plans.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.channel.cmp(&b.channel)));
        plans
    }

    fn adjust(&self, route: &ChannelRoute, severity: MessageSeverity, expertise: bool) -> DeliveryPlan {
        let availability = self.availability(route);

        let mut priority = i32::from(route.priority) + urgency_bonus(severity);
        // +/-5 around the neutral availability of 0.5
        priority += ((availability - 0.5) * 10.0).round() as i32;
        if expertise {
            priority += i32::from(self.config.expertise_priority_bonus);
        }

        let delay = if severity == MessageSeverity::Critical {
            Duration::ZERO
        } else {
            // fully available recipients get no delay, unavailable ones twice the base
            let base = route.delay_secs.min(MAX_ROUTE_DELAY_SECS) as f64;
            let scaled = base * (2.0 - 2.0 * availability) * urgency_delay_factor(severity);
            Duration::try_from_secs_f64(scaled).unwrap_or(Duration::ZERO)
        };

        DeliveryPlan {
            channel: route.channel.clone(),
            priority: priority.clamp(0, 100) as u8,
            delay,
        }
    }
}

fn urgency_bonus(severity: MessageSeverity) -> i32 {
    match severity {
        MessageSeverity::Critical => 40,
        MessageSeverity::ActionRequired => 25,
        MessageSeverity::Warning => 10,
        MessageSeverity::Success | MessageSeverity::Info => 0,
    }
}

fn urgency_delay_factor(severity: MessageSeverity) -> f64 {
    match severity {
        MessageSeverity::Critical => 0.0,
        MessageSeverity::ActionRequired => 0.5,
        MessageSeverity::Warning => 0.75,
        MessageSeverity::Success | MessageSeverity::Info => 1.0,
    }
}

fn build_vocabulary(keywords: &[String]) -> Option<Regex> {
    let words: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }
    match Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "Expertise vocabulary rejected, keyword routing disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingTable;
    use overwatch_core::SourceKind;

    fn message(severity: MessageSeverity, title: &str) -> Message {
        Message::new(SourceKind::Orchestrator, severity, title, "")
    }

    fn policy(routes: RoutingTable) -> RoutingPolicy {
        let mut config = NotificationConfig {
            routes,
            ..NotificationConfig::default()
        };
        config.availability.insert("oncall".into(), 1.0);
        config.availability.insert("away".into(), 0.0);
        RoutingPolicy::new(config)
    }

    #[test]
    fn test_availability_shortens_delay() {
        let routes = RoutingTable {
            info: vec![
                ChannelRoute::new("a").with_delay(60).for_recipient("oncall"),
                ChannelRoute::new("b").with_delay(60).for_recipient("away"),
                ChannelRoute::new("c").with_delay(60),
            ],
            ..RoutingTable::default()
        };
        let plans = policy(routes).plan(&message(MessageSeverity::Info, "sync done"));
        let delay = |name: &str| plans.iter().find(|p| p.channel == name).map(|p| p.delay);
        assert_eq!(delay("a"), Some(Duration::ZERO));
        assert_eq!(delay("b"), Some(Duration::from_secs(120)));
        assert_eq!(delay("c"), Some(Duration::from_secs(60)));
        // available recipient ranks first
        assert_eq!(plans[0].channel, "a");
    }

    #[test]
    fn test_critical_never_delayed() {
        let routes = RoutingTable {
            critical: vec![ChannelRoute::new("pager").with_delay(600).for_recipient("away")],
            ..RoutingTable::default()
        };
        let plans = policy(routes).plan(&message(MessageSeverity::Critical, "gate blocked"));
        assert_eq!(plans[0].delay, Duration::ZERO);
        assert_eq!(plans[0].priority, 85);
    }

    #[test]
    fn test_expertise_bumps_priority_not_channels() {
        let routes = RoutingTable {
            warning: vec![ChannelRoute::new("slack")],
            ..RoutingTable::default()
        };
        let policy = policy(routes);
        let plain = policy.plan(&message(MessageSeverity::Warning, "slow build"));
        let expert = policy.plan(&message(MessageSeverity::Warning, "Invalid Geometry in parcel layer"));
        assert_eq!(plain.len(), expert.len());
        assert_eq!(plain[0].channel, expert[0].channel);
        assert_eq!(expert[0].priority, plain[0].priority + 15);
        assert!(!policy.requires_expertise(&message(MessageSeverity::Info, "geometrical")));
    }

    #[test]
    fn test_fanout_covers_all_channels() {
        let routes = RoutingTable {
            critical: vec![ChannelRoute::new("pager").with_priority(90)],
            ..RoutingTable::default()
        };
        let msg = message(MessageSeverity::Critical, "agent crashed");
        let plans = policy(routes).plan_fanout(&msg, ["log", "pager", "slack"]);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].channel, "pager");
        assert!(plans.iter().all(|p| p.delay == Duration::ZERO));
    }

    #[test]
    fn test_action_required_halves_delay() {
        let routes = RoutingTable {
            action_required: vec![ChannelRoute::new("slack").with_delay(100)],
            ..RoutingTable::default()
        };
        let plans = policy(routes).plan(&message(MessageSeverity::ActionRequired, "approve?"));
        assert_eq!(plans[0].delay, Duration::from_secs(50));
    }

    #[test]
    fn test_out_of_range_delay_inputs_do_not_panic() {
        let routes = RoutingTable {
            info: vec![ChannelRoute::new("log").with_delay(u64::MAX)],
            ..RoutingTable::default()
        };
        let plans = policy(routes.clone()).plan(&message(MessageSeverity::Info, "nightly"));
        assert_eq!(plans[0].delay, Duration::from_secs(MAX_ROUTE_DELAY_SECS));

        let nan = RoutingPolicy::new(NotificationConfig {
            routes,
            default_availability: f64::NAN,
            ..NotificationConfig::default()
        });
        let plans = nan.plan(&message(MessageSeverity::Info, "nightly"));
        assert_eq!(plans[0].delay, Duration::ZERO);
    }
}
