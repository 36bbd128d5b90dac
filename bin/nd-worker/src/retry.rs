//! The retry state machine: `process_with_retry` / `process`.

use std::time::Duration;

use nd_common::{Notification, Status};
use nd_config::RetryConfig;
use nd_provider::{ProviderError, ProviderRegistry};
use nd_store::{NotificationStore, StoreError};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("interrupted by shutdown during backoff")]
    ShutdownInterrupted,
}

impl ProcessError {
    /// Errors that should short-circuit straight to the DLQ instead of
    /// spending the remaining retry budget: no provider is registered for
    /// the channel, or the notification itself fails validation. Neither
    /// condition can change between attempts within one delivery.
    pub(crate) fn is_permanent(&self) -> bool {
        matches!(self, ProcessError::Provider(e) if e.is_permanent())
    }
}

/// One call to the provider's send path, followed by a status update.
///
/// On success: marks `Sent`, clears `last_error`. If the status update
/// itself fails, that error propagates (the retry loop will re-attempt;
/// re-writing `Sent` is idempotent).
///
/// On send failure: marks `Failed` with the error text. A failure to
/// persist that status is logged but does not mask the original send
/// error — the send outcome alone drives the retry decision.
pub async fn process(
    notification: &mut Notification,
    registry: &ProviderRegistry,
    store: &dyn NotificationStore,
    deadline: Duration,
) -> Result<(), ProcessError> {
    let send_result = registry.send(notification, deadline).await;

    notification.attempts += 1;
    notification.last_tried = Some(chrono::Utc::now());

    match send_result {
        Ok(()) => {
            notification.status = Status::Sent;
            notification.last_error = None;
            store.update_status(notification).await?;
            Ok(())
        }
        Err(send_err) => {
            notification.status = Status::Failed;
            notification.last_error = Some(send_err.to_string());
            if let Err(store_err) = store.update_status(notification).await {
                error!(
                    id = %notification.id,
                    error = %store_err,
                    "failed to persist status after send failure"
                );
            }
            Err(send_err.into())
        }
    }
}

/// Runs up to `retry.max_retries` attempts with exponential backoff,
/// `min(D0 * 2^(attempt-2), D_max)` milliseconds between attempts. The
/// backoff sleep races the shutdown broadcast so a shutdown request
/// interrupts a pending backoff rather than blocking it. A permanent error
/// (no such provider, validation failure) short-circuits on the first
/// attempt rather than spending the full retry budget.
pub async fn process_with_retry(
    notification: &mut Notification,
    registry: &ProviderRegistry,
    store: &dyn NotificationStore,
    retry: &RetryConfig,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), ProcessError> {
    let mut last_err: Option<ProcessError> = None;

    for attempt in 1..=retry.max_retries {
        if attempt > 1 {
            let delay_ms = (retry.initial_delay_ms.saturating_mul(1u64 << (attempt - 2)))
                .min(retry.max_delay_ms);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                _ = shutdown.recv() => return Err(ProcessError::ShutdownInterrupted),
            }
        }

        match process(notification, registry, store, retry.process_timeout).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(id = %notification.id, attempt, error = %err, "delivery attempt failed");
                let permanent = err.is_permanent();
                last_err = Some(err);
                if permanent {
                    debug!(id = %notification.id, "permanent error, short-circuiting to DLQ");
                    break;
                }
            }
        }
    }

    Err(last_err.expect("loop runs at least once when max_retries >= 1"))
}
