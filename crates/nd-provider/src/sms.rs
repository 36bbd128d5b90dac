use std::time::Duration;

use async_trait::async_trait;
use nd_common::Notification;
use nd_config::TwilioConfig;
use reqwest::Client;

use crate::error::ProviderError;
use crate::{race_against_deadline, validate, Provider, Result};

const TWILIO_BASE_URL: &str = "https://api.twilio.com";

/// Sends SMS via Twilio's REST API (`Messages.json`), the same endpoint the
/// Twilio Go SDK calls under the hood.
pub struct TwilioSmsProvider {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    base_url: String,
}

impl TwilioSmsProvider {
    pub fn new(cfg: TwilioConfig) -> Self {
        Self::with_base_url(cfg, TWILIO_BASE_URL.to_string())
    }

    /// Construct pointed at a specific base URL, for tests against a
    /// `wiremock` server.
    pub fn with_base_url(cfg: TwilioConfig, base_url: String) -> Self {
        Self {
            client: Client::new(),
            account_sid: cfg.account_sid,
            auth_token: cfg.auth_token,
            from_number: cfg.from_number,
            base_url,
        }
    }
}

#[async_trait]
impl Provider for TwilioSmsProvider {
    fn validate(&self, notification: &Notification) -> Result<()> {
        validate::non_empty(&notification.message, &notification.recipient)?;
        validate::phone(&notification.recipient)?;
        validate::sms_length(&notification.message)?;
        Ok(())
    }

    async fn send(&self, notification: &Notification, deadline: Duration) -> Result<()> {
        let client = self.client.clone();
        let account_sid = self.account_sid.clone();
        let auth_token = self.auth_token.clone();
        let from_number = self.from_number.clone();
        let base_url = self.base_url.clone();
        let to = notification.recipient.clone();
        let body = notification.message.clone();

        race_against_deadline(deadline, async move {
            let url = format!("{base_url}/2010-04-01/Accounts/{account_sid}/Messages.json");
            let response = client
                .post(url)
                .basic_auth(&account_sid, Some(&auth_token))
                .form(&[("To", to.as_str()), ("From", from_number.as_str()), ("Body", body.as_str())])
                .send()
                .await?;

            let status = response.status();
            if status.as_u16() >= 300 {
                let text = response.text().await.unwrap_or_default();
                return Err(ProviderError::Send(format!("twilio API error: {status} - {text}")));
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
            channel: Channel::Sms,
            recipient: recipient.to_string(),
            message: message.to_string(),
            metadata: HashMap::new(),
        }
        .into_pending()
    }

    #[tokio::test]
    async fn sends_successfully_against_mock_twilio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let provider = TwilioSmsProvider::with_base_url(
            TwilioConfig {
                account_sid: "AC123".into(),
                auth_token: "secret".into(),
                from_number: "+15550000000".into(),
            },
            server.uri(),
        );

        let n = notification("+15551234567", "hi there");
        provider.send(&n, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn surfaces_non_2xx_as_send_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = TwilioSmsProvider::with_base_url(
            TwilioConfig {
                account_sid: "AC123".into(),
                auth_token: "secret".into(),
                from_number: "+15550000000".into(),
            },
            server.uri(),
        );

        let n = notification("+15551234567", "hi there");
        let err = provider.send(&n, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Send(_)));
    }

    #[test]
    fn validate_rejects_invalid_phone() {
        let provider = TwilioSmsProvider::new(TwilioConfig::default());
        let n = notification("5551234567", "hi");
        assert!(provider.validate(&n).is_err());
    }
}
