use crate::channel::DeliveryChannel;
use async_trait::async_trait;
use overwatch_core::{Message, OverwatchError, OverwatchResult};
use serde::{Deserialize, Serialize};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram adapter using the Bot API `sendMessage` method.
pub struct TelegramChannel {
    name: String,
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            name: "telegram".to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
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

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> OverwatchResult<()> {
        let text = message.render_text();
        let payload = SendMessageRequest {
            chat_id: &self.chat_id,
            text: &text,
        };

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| super::transport_error(&self.name, &e))?;

        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| OverwatchError::delivery(&self.name, format!("parse error: {e}")))?;

        if !body.ok {
            return Err(OverwatchError::delivery(
                &self.name,
                format!("sendMessage failed: {}", body.description.unwrap_or_default()),
            ));
        }

        Ok(())
    }
}
