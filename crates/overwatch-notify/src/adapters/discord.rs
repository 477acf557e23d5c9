use crate::channel::DeliveryChannel;
use async_trait::async_trait;
use overwatch_core::{Message, OverwatchError, OverwatchResult};
use serde::Serialize;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord adapter using the REST create-message endpoint.
pub struct DiscordChannel {
    name: String,
    bot_token: String,
    channel_id: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    content: &'a str,
}

impl DiscordChannel {
    pub fn new(bot_token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            name: "discord".to_string(),
            bot_token: bot_token.into(),
            channel_id: channel_id.into(),
            api_base: DISCORD_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl DeliveryChannel for DiscordChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> OverwatchResult<()> {
        let url = format!("{}/channels/{}/messages", self.api_base, self.channel_id);
        let content = message.render_text();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&CreateMessageRequest { content: &content })
            .send()
            .await
            .map_err(|e| super::transport_error(&self.name, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = super::failure_body(response).await;
            return Err(OverwatchError::delivery(
                &self.name,
                format!("create message failed ({status}): {body}"),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use overwatch_core::{MessageSeverity, SourceKind};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/42/messages"))
            .and(header("authorization", "Bot secret"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Missing Access"))
            .mount(&server)
            .await;

        let channel = DiscordChannel::new("secret", "42").with_api_base(server.uri());
        let msg = Message::new(SourceKind::QualityGate, MessageSeverity::Warning, "Gate", "");
        let err = channel.send(&msg).await.unwrap_err();
        assert!(err.to_string().contains("Missing Access"));
    }
}
