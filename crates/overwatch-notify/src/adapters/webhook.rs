use crate::channel::DeliveryChannel;
use async_trait::async_trait;
use overwatch_core::{Message, OverwatchError, OverwatchResult};

/// Posts the full message as JSON to an arbitrary HTTP endpoint.
pub struct WebhookChannel {
    name: String,
    url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            bearer_token: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> OverwatchResult<()> {
        let mut request = self.client.post(&self.url).json(message);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| super::transport_error(&self.name, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = super::failure_body(response).await;
            return Err(OverwatchError::delivery(
                &self.name,
                format!("webhook returned {status}: {body}"),
            ));
        }

        Ok(())
    }
}
