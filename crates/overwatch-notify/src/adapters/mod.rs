/// Discord REST adapter.
pub mod discord;
/// Structured-log adapter.
pub mod log;
/// Slack Web API adapter.
pub mod slack;
/// Telegram Bot API adapter.
pub mod telegram;
/// Generic JSON webhook adapter.
pub mod webhook;

pub use discord::DiscordChannel;
pub use log::LogChannel;
pub use slack::SlackChannel;
pub use telegram::TelegramChannel;
pub use webhook::WebhookChannel;

use overwatch_core::OverwatchError;

/// Read a response body for an error message without failing on it.
pub(crate) async fn failure_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

pub(crate) fn transport_error(channel: &str, e: &reqwest::Error) -> OverwatchError {
    OverwatchError::delivery(channel, format!("transport error: {e}"))
}
