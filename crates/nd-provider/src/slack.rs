use std::time::Duration;

use async_trait::async_trait;
use nd_common::Notification;
use nd_config::SlackConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::{race_against_deadline, validate, Provider, Result};

const SLACK_BASE_URL: &str = "https://slack.com";

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts to a Slack channel via `chat.postMessage`. The recipient is treated
/// as the target channel id, matching the upstream API contract.
pub struct SlackChatProvider {
    client: Client,
    bot_token: String,
    base_url: String,
}

impl SlackChatProvider {
    pub fn new(cfg: SlackConfig) -> Self {
        Self::with_base_url(cfg, SLACK_BASE_URL.to_string())
    }

    pub fn with_base_url(cfg: SlackConfig, base_url: String) -> Self {
        Self {
            client: Client::new(),
            bot_token: cfg.bot_token,
            base_url,
        }
    }
}

#[async_trait]
impl Provider for SlackChatProvider {
    fn validate(&self, notification: &Notification) -> Result<()> {
        validate::non_empty(&notification.message, &notification.recipient)
    }

    async fn send(&self, notification: &Notification, deadline: Duration) -> Result<()> {
        let client = self.client.clone();
        let bot_token = self.bot_token.clone();
        let base_url = self.base_url.clone();
        let channel = notification.recipient.clone();
        let text = notification.message.clone();

        race_against_deadline(deadline, async move {
            let response = client
                .post(format!("{base_url}/api/chat.postMessage"))
                .bearer_auth(bot_token)
                .json(&json!({ "channel": channel, "text": text }))
                .send()
                .await?;

            let status = response.status();
            if status.as_u16() >= 300 {
                let text = response.text().await.unwrap_or_default();
                return Err(ProviderError::Send(format!("slack API error: {status} - {text}")));
            }

            let body: SlackResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Send(format!("malformed slack response: {e}")))?;
            if !body.ok {
                let reason = body.error.unwrap_or_else(|| "unknown error".to_string());
                return Err(ProviderError::Send(format!(
                    "failed to send Slack message: {reason}"
                )));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_common::{Channel, NotificationRequest};
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification(recipient: &str, message: &str) -> Notification {
        NotificationRequest {
            channel: Channel::Slack,
            recipient: recipient.to_string(),
            message: message.to_string(),
            metadata: HashMap::new(),
        }
        .into_pending()
    }

    #[tokio::test]
    async fn sends_successfully_against_mock_slack() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let provider = SlackChatProvider::with_base_url(
            SlackConfig { bot_token: "xoxb-test".into() },
            server.uri(),
        );
        let n = notification("C123", "hello");
        provider.send(&n, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn surfaces_ok_false_as_send_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "channel_not_found"})))
            .mount(&server)
            .await;

        let provider = SlackChatProvider::with_base_url(
            SlackConfig { bot_token: "xoxb-test".into() },
            server.uri(),
        );
        let n = notification("C123", "hello");
        let err = provider.send(&n, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }
}
