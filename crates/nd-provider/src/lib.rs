//! Provider registry and per-channel notification providers.
//!
//! The channel set is closed (`sms`, `email`, `slack`), so the registry
//! dispatches by matching on [`nd_common::Channel`] rather than through a
//! runtime `HashMap<Channel, Box<dyn Provider>>` — an unhandled channel is a
//! compile error, not a runtime lookup miss.

pub mod error;
pub mod mock;
pub mod validate;

mod email;
mod slack;
mod sms;

pub use email::SendGridEmailProvider;
pub use error::ProviderError;
pub use mock::MockProvider;
pub use slack::SlackChatProvider;
pub use sms::TwilioSmsProvider;

use std::time::Duration;

use async_trait::async_trait;
use nd_common::Notification;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// A channel-specific notification provider: validates before persistence,
/// sends during worker processing.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Pure, no I/O. Rejects malformed recipients / oversized messages.
    fn validate(&self, notification: &Notification) -> Result<()>;

    /// Performs delivery. Must honor `deadline`: if it elapses before the
    /// underlying call completes, return `ProviderError::Cancelled` promptly
    /// rather than block past it.
    async fn send(&self, notification: &Notification, deadline: Duration) -> Result<()>;
}

/// Strategy registry: one provider per channel, matched exhaustively.
pub struct ProviderRegistry {
    sms: Box<dyn Provider>,
    email: Box<dyn Provider>,
    slack: Box<dyn Provider>,
}

impl ProviderRegistry {
    pub fn new(sms: Box<dyn Provider>, email: Box<dyn Provider>, slack: Box<dyn Provider>) -> Self {
        Self { sms, email, slack }
    }

    pub fn get(&self, channel: nd_common::Channel) -> &dyn Provider {
        match channel {
            nd_common::Channel::Sms => self.sms.as_ref(),
            nd_common::Channel::Email => self.email.as_ref(),
            nd_common::Channel::Slack => self.slack.as_ref(),
        }
    }

    pub fn validate(&self, notification: &Notification) -> Result<()> {
        self.get(notification.channel).validate(notification)
    }

    pub async fn send(&self, notification: &Notification, deadline: Duration) -> Result<()> {
        self.get(notification.channel).send(notification, deadline).await
    }
}

/// Race a blocking/slow SDK call (spawned as its own task) against a
/// deadline, so the caller never blocks past the deadline even if the
/// underlying future does not cooperate with cancellation. Mirrors the
/// goroutine + buffered(1)-channel + `select` pattern used for email/Slack
/// sends in the system this was modeled on, generalized to every provider.
pub(crate) async fn race_against_deadline<F, T>(deadline: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move {
        let result = fut.await;
        let _ = tx.send(result);
    });

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(ProviderError::Send(
            "send task ended without producing a result".to_string(),
        )),
        Err(_) => {
            // Deadline elapsed first; let the detached task finish on its
            // own and discard whatever it eventually sends.
            handle.abort();
            Err(ProviderError::Cancelled(
                "send operation cancelled: deadline exceeded".to_string(),
            ))
        }
    }
}
