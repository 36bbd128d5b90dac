use std::time::Duration;

use async_trait::async_trait;
use nd_common::Notification;
use nd_config::SendGridConfig;
use reqwest::Client;
use serde_json::json;

use crate::error::ProviderError;
use crate::{race_against_deadline, validate, Provider, Result};

const SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
const DEFAULT_SUBJECT: &str = "Notification";

/// Sends email via SendGrid's `v3/mail/send` API.
pub struct SendGridEmailProvider {
    client: Client,
    api_key: String,
    from_address: String,
    from_name: String,
    default_subject: String,
    base_url: String,
}

impl SendGridEmailProvider {
    pub fn new(cfg: SendGridConfig) -> Self {
        Self::with_base_url(cfg, SENDGRID_BASE_URL.to_string())
    }

    pub fn with_base_url(cfg: SendGridConfig, base_url: String) -> Self {
        let default_subject = if cfg.default_subject.is_empty() {
            DEFAULT_SUBJECT.to_string()
        } else {
            cfg.default_subject
        };
        Self {
            client: Client::new(),
            api_key: cfg.api_key,
            from_address: cfg.from_address,
            from_name: cfg.from_name,
            default_subject,
            base_url,
        }
    }

    /// Subject precedence: per-notification metadata overrides the
    /// configured default, which overrides the hardcoded fallback.
    fn resolve_subject(&self, notification: &Notification) -> String {
        notification
            .metadata
            .get("email_subject")
            .cloned()
            .unwrap_or_else(|| self.default_subject.clone())
    }
}

#[async_trait]
impl Provider for SendGridEmailProvider {
    fn validate(&self, notification: &Notification) -> Result<()> {
        validate::non_empty(&notification.message, &notification.recipient)?;
        validate::email(&notification.recipient)?;
        Ok(())
    }

    async fn send(&self, notification: &Notification, deadline: Duration) -> Result<()> {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let base_url = self.base_url.clone();
        let from_address = self.from_address.clone();
        let from_name = self.from_name.clone();
        let to = notification.recipient.clone();
        let subject = self.resolve_subject(notification);
        let plain_text = notification.message.clone();
        let html = format!("<p>{}</p>", notification.message);

        race_against_deadline(deadline, async move {
            let payload = json!({
                "personalizations": [{ "to": [{ "email": to }] }],
                "from": { "email": from_address, "name": from_name },
                "subject": subject,
                "content": [
                    { "type": "text/plain", "value": plain_text },
                    { "type": "text/html", "value": html },
                ],
            });

            let response = client
                .post(format!("{base_url}/v3/mail/send"))
                .bearer_auth(api_key)
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            if status.as_u16() >= 300 {
                let text = response.text().await.unwrap_or_default();
                return Err(ProviderError::Send(format!(
                    "sendgrid API error: {status} - {text}"
                )));
            }
            Ok(())
        })
        .await
    }
}
