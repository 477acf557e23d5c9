use anyhow::Context;
use overwatch_decision::DecisionConfig;
use overwatch_notify::{
    DeliveryChannel, DiscordChannel, LogChannel, NotificationConfig, SlackChannel,
    TelegramChannel, WebhookChannel,
};
use overwatch_orchestrator::{AgentConfig, OrchestratorConfig, TaskKindConfig};
use overwatch_quality::QualityConfig;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Contents of `overwatch.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OverwatchConfig {
    pub orchestrator: OrchestratorConfig,
    pub decision: DecisionConfig,
    pub quality: QualityConfig,
    pub notifications: NotificationConfig,
    pub agents: Vec<AgentConfig>,
    pub task_kinds: Vec<TaskKindConfig>,
    pub channels: Vec<ChannelConfig>,
}

/// A delivery channel. Credentials are read from the named environment
/// variable at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    Log {
        #[serde(default)]
        name: Option<String>,
    },
    Slack {
        #[serde(default)]
        name: Option<String>,
        token_env: String,
        conversation: String,
    },
    Discord {
        #[serde(default)]
        name: Option<String>,
        token_env: String,
        channel_id: String,
    },
    Telegram {
        #[serde(default)]
        name: Option<String>,
        token_env: String,
        chat_id: String,
    },
    Webhook {
        name: String,
        url: String,
        #[serde(default)]
        token_env: Option<String>,
    },
}

impl OverwatchConfig {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Instantiate the configured channels. A `log` channel is always
    /// present so the default routes resolve.
    pub fn build_channels(&self) -> anyhow::Result<Vec<Arc<dyn DeliveryChannel>>> {
        let mut channels: Vec<Arc<dyn DeliveryChannel>> = Vec::new();
        for channel in &self.channels {
            channels.push(channel.build(&env_lookup)?);
        }
        if !channels.iter().any(|c| c.name() == "log") {
            channels.push(Arc::new(LogChannel::new()));
        }
        Ok(channels)
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl ChannelConfig {
    fn build(
        &self,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Arc<dyn DeliveryChannel>> {
        let secret = |key: &str| {
            env(key).with_context(|| format!("environment variable {key} is not set"))
        };
        Ok(match self {
            ChannelConfig::Log { name } => {
                let channel = LogChannel::new();
                match name {
                    Some(name) => Arc::new(channel.with_name(name)),
                    None => Arc::new(channel),
                }
            }
            ChannelConfig::Slack {
                name,
                token_env,
                conversation,
            } => {
                let channel = SlackChannel::new(secret(token_env)?, conversation);
                match name {
                    Some(name) => Arc::new(channel.with_name(name)),
                    None => Arc::new(channel),
                }
            }
            ChannelConfig::Discord {
                name,
                token_env,
                channel_id,
            } => {
                let channel = DiscordChannel::new(secret(token_env)?, channel_id);
                match name {
                    Some(name) => Arc::new(channel.with_name(name)),
                    None => Arc::new(channel),
                }
            }
            ChannelConfig::Telegram {
                name,
                token_env,
                chat_id,
            } => {
                let channel = TelegramChannel::new(secret(token_env)?, chat_id);
                match name {
                    Some(name) => Arc::new(channel.with_name(name)),
                    None => Arc::new(channel),
                }
            }
            ChannelConfig::Webhook {
                name,
                url,
                token_env,
            } => {
                let channel = WebhookChannel::new(name, url);
                match token_env {
                    Some(key) => Arc::new(channel.with_bearer_token(secret(key)?)),
                    None => Arc::new(channel),
                }
            }
        })
    }
}
