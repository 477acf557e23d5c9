use crate::channel::DeliveryChannel;
use async_trait::async_trait;
use overwatch_core::{Message, OverwatchError, OverwatchResult};
use serde::{Deserialize, Serialize};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Slack adapter posting to one conversation through `chat.postMessage`.
pub struct SlackChannel {
    name: String,
    bot_token: String,
    conversation: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackChannel {
    /// * `bot_token`: A Slack Bot User OAuth token (`xoxb-...`).
    /// * `conversation`: Channel id the messages are posted to.
    pub fn new(bot_token: impl Into<String>, conversation: impl Into<String>) -> Self {
        Self {
            name: "slack".to_string(),
            bot_token: bot_token.into(),
            conversation: conversation.into(),
            api_base: SLACK_API_BASE.to_string(),
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
impl DeliveryChannel for SlackChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> OverwatchResult<()> {
        let text = message.render_text();
        let payload = PostMessageRequest {
            channel: &self.conversation,
            text: &text,
        };

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| super::transport_error(&self.name, &e))?;

        let body: SlackApiResponse = response
            .json()
            .await
            .map_err(|e| OverwatchError::delivery(&self.name, format!("parse error: {e}")))?;

        if !body.ok {
            return Err(OverwatchError::delivery(
                &self.name,
                format!("chat.postMessage failed: {}", body.error.unwrap_or_default()),
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
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> Message {
        Message::new(SourceKind::Orchestrator, MessageSeverity::Critical, "Agent crashed", "agent-1")
    }

    #[tokio::test]
    async fn test_send_posts_to_conversation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(serde_json::json!({"channel": "C123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let channel = SlackChannel::new("xoxb-test", "C123").with_api_base(server.uri());
        channel.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let channel = SlackChannel::new("xoxb-test", "C404")
            .with_name("slack-ops")
            .with_api_base(server.uri());
        let err = channel.send(&message()).await.unwrap_err();
        match err {
            OverwatchError::DeliveryFailure { channel, reason } => {
                assert_eq!(channel, "slack-ops");
                assert!(reason.contains("channel_not_found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
