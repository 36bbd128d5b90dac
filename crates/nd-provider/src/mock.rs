use std::time::Duration;

use async_trait::async_trait;
use nd_common::{Channel, Notification};
use parking_lot::Mutex;

use crate::error::ProviderError;
use crate::{validate, Provider, Result};

/// In-memory provider used for worker tests and for `USE_MOCK_PROVIDERS=true`
/// operation. Records every notification it is asked to send and can be
/// told to fail exactly the next call, mirroring the original mock
/// providers' `FailNext`/`GetSent`/`Reset` hooks.
pub struct MockProvider {
    channel: Channel,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    sent: Vec<Notification>,
    fail_next: bool,
}

impl MockProvider {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn fail_next(&self) {
        self.state.lock().fail_next = true;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.state.lock().sent.clone()
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.sent.clear();
        state.fail_next = false;
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn validate(&self, notification: &Notification) -> Result<()> {
        validate::non_empty(&notification.message, &notification.recipient)?;
        match self.channel {
            Channel::Sms => {
                validate::phone(&notification.recipient)?;
                validate::sms_length(&notification.message)?;
            }
            Channel::Email => validate::email(&notification.recipient)?,
            Channel::Slack => {}
        }
        Ok(())
    }

    async fn send(&self, notification: &Notification, _deadline: Duration) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_next {
            state.fail_next = false;
            return Err(ProviderError::Send(format!(
                "mock {} provider failure",
                self.channel
            )));
        }
        state.sent.push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_common::NotificationRequest;
    use std::collections::HashMap;

    fn notification() -> Notification {
        NotificationRequest {
            channel: Channel::Sms,
            recipient: "+15551234567".into(),
            message: "hi".into(),
            metadata: HashMap::new(),
        }
        .into_pending()
    }

    #[tokio::test]
    async fn records_sent_notifications() {
        let provider = MockProvider::new(Channel::Sms);
        provider.send(&notification(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(provider.sent().len(), 1);
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_once() {
        let provider = MockProvider::new(Channel::Sms);
        provider.fail_next();
        assert!(provider.send(&notification(), Duration::from_secs(1)).await.is_err());
        assert!(provider.send(&notification(), Duration::from_secs(1)).await.is_ok());
    }

    #[test]
    fn reset_clears_sent_and_fail_next() {
        let provider = MockProvider::new(Channel::Sms);
        provider.fail_next();
        provider.reset();
        assert!(provider.sent().is_empty());
    }
}
