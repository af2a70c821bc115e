use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::Notifier;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers alerts as chat messages through the Telegram Bot API.
pub struct TelegramBot {
    client: Client,
    api_base: String,
    bot_key: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Envelope every Bot API reply carries.
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramBot {
    pub fn new(bot_key: String, chat_id: String) -> Result<Self> {
        Self::with_api_base(TELEGRAM_API_BASE, bot_key, chat_id)
    }

    fn with_api_base(api_base: &str, bot_key: String, chat_id: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build telegram http client")?;
        Ok(Self {
            client,
            api_base: api_base.to_string(),
            bot_key,
            chat_id,
        })
    }

    /// Sends `text` to the configured chat.
    ///
    /// The bot token is part of the request path, so transport errors are
    /// reported without their URL.
    pub async fn push_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_key);
        let body = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
        };
        let reply = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("telegram request failed", e))?
            .text()
            .await
            .map_err(|e| transport_error("failed to read telegram reply", e))?;
        check_reply(&reply)
    }
}

fn transport_error(context: &str, err: reqwest::Error) -> anyhow::Error {
    anyhow!("{context}: {}", err.without_url())
}

fn check_reply(body: &str) -> Result<()> {
    let reply: BotApiResponse =
        serde_json::from_str(body).context("unexpected telegram response")?;
    if !reply.ok {
        bail!(
            "telegram rejected message: {}",
            reply.description.as_deref().unwrap_or("no description")
        );
    }
    Ok(())
}

/// Title on the first line, message below.
fn format_message(title: &str, message: &str) -> String {
    format!("{title}\n{message}")
}

#[async_trait]
impl Notifier for TelegramBot {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.push_message(&format_message(title, message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_puts_title_first() {
        assert_eq!(
            format_message("High Rate Alert: AUD/CNY = 4.95", "AUD/CNY is above 4.9"),
            "High Rate Alert: AUD/CNY = 4.95\nAUD/CNY is above 4.9"
        );
    }

    #[test]
    fn rejected_reply_is_an_error() {
        let accepted = r#"{"ok":true,"result":{"message_id":7}}"#;
        assert!(check_reply(accepted).is_ok());
        let rejected = r#"{"ok":false,"description":"Bad Request: chat not found"}"#;
        let err = check_reply(rejected).unwrap_err();
        assert!(err.to_string().contains("chat not found"));
        assert!(check_reply("<html>502</html>").is_err());
    }

    #[tokio::test]
    async fn transport_error_hides_bot_token() {
        let bot = TelegramBot::with_api_base(
            "http://127.0.0.1:9",
            "123456:SECRET-TOKEN".to_string(),
            "42".to_string(),
        )
        .unwrap();
        let err = bot.push_message("hello").await.unwrap_err();
        assert!(!format!("{err:#}").contains("SECRET-TOKEN"), "{err:#}");
        assert!(!format!("{err:?}").contains("SECRET-TOKEN"));
    }
}
