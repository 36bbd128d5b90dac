//! Per-channel consumer loop: decode, run the retry state machine, and
//! route to ack/DLQ/requeue accordingly.

use std::sync::Arc;

use futures_util::StreamExt;
use nd_broker::BrokerGateway;
use nd_common::{Channel, Notification};
use nd_config::RetryConfig;
use nd_provider::ProviderRegistry;
use nd_store::NotificationStore;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::retry::{process_with_retry, ProcessError};

/// Runs forever (until shutdown), consuming one channel's work queue.
/// Fully isolated from the other channels' consumer tasks.
pub async fn run(
    channel: Channel,
    queue_name: String,
    dlq_queue_name: String,
    broker: Arc<dyn BrokerGateway>,
    store: Arc<dyn NotificationStore>,
    registry: Arc<ProviderRegistry>,
    retry: RetryConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let consumer_tag = format!("nd-worker-{}", channel.as_str());
    let stream = match broker.consume(&queue_name, &consumer_tag).await {
        Ok(s) => s,
        Err(e) => {
            error!(%channel, error = %e, "failed to start consumer");
            return;
        }
    };
    tokio::pin!(stream);

    info!(%channel, queue = %queue_name, "consumer started");

    loop {
        let delivery = tokio::select! {
            item = stream.next() => item,
            _ = shutdown.recv() => {
                info!(%channel, "shutdown received, stopping consumer");
                break;
            }
        };

        let delivery = match delivery {
            Some(Ok(delivery)) => delivery,
            Some(Err(e)) => {
                error!(%channel, error = %e, "error receiving delivery");
                continue;
            }
            None => {
                warn!(%channel, "consumer stream ended");
                break;
            }
        };

        let raw = delivery.body().to_vec();
        let mut notification: Notification = match serde_json::from_slice(&raw) {
            Ok(n) => n,
            Err(e) => {
                warn!(%channel, error = %e, "malformed delivery, routing to DLQ");
                if let Err(e) = broker.publish_to_queue(&dlq_queue_name, &raw).await {
                    error!(%channel, error = %e, "failed to route malformed delivery to DLQ, requeuing instead");
                    let _ = delivery.nack(true).await;
                } else {
                    let _ = delivery.ack().await;
                }
                continue;
            }
        };

        let outcome = process_with_retry(
            &mut notification,
            &registry,
            store.as_ref(),
            &retry,
            &mut shutdown.resubscribe(),
        )
        .await;

        match outcome {
            Ok(()) => {
                info!(%channel, id = %notification.id, "notification delivered");
                if let Err(e) = delivery.ack().await {
                    error!(%channel, error = %e, "failed to ack delivered message");
                }
            }
            Err(ProcessError::ShutdownInterrupted) => {
                // Shutdown fired mid-backoff: the retry budget was not exhausted, so
                // this must come back on the queue rather than be routed to the DLQ.
                info!(%channel, id = %notification.id, "shutdown interrupted delivery, requeuing");
                if let Err(e) = delivery.nack(true).await {
                    error!(%channel, error = %e, "failed to requeue delivery interrupted by shutdown");
                }
            }
            Err(err) => {
                warn!(%channel, id = %notification.id, error = %err, "delivery exhausted, routing to DLQ");
                if let Err(e) = broker.publish_to_queue(&dlq_queue_name, &raw).await {
                    error!(%channel, error = %e, "failed to route exhausted delivery to DLQ, requeuing instead");
                    let _ = delivery.nack(true).await;
                } else if let Err(e) = delivery.ack().await {
                    error!(%channel, error = %e, "failed to ack after DLQ routing");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_common::NotificationRequest;
    use nd_provider::{MockProvider, Provider, ProviderRegistry};
    use nd_store::InMemoryNotificationStore;
    use std::collections::HashMap;
    use std::time::Duration;

    fn retry_cfg() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay_ms: 200,
            max_delay_ms: 200,
            process_timeout: Duration::from_secs(1),
        }
    }

    fn notification_body(channel: Channel, recipient: &str) -> Vec<u8> {
        let n = NotificationRequest {
            channel,
            recipient: recipient.to_string(),
            message: "hi".to_string(),
            metadata: HashMap::new(),
        }
        .into_pending();
        serde_json::to_vec(&n).unwrap()
    }

    fn registry_with(sms: Box<dyn Provider>) -> Arc<ProviderRegistry> {
        Arc::new(ProviderRegistry::new(
            sms,
            Box::new(MockProvider::new(Channel::Email)),
            Box::new(MockProvider::new(Channel::Slack)),
        ))
    }

    #[tokio::test]
    async fn successful_delivery_is_acked_not_dlqd() {
        let broker = Arc::new(nd_broker::InMemoryBrokerGateway::new());
        broker
            .publish_to_queue("sms-queue", &notification_body(Channel::Sms, "+15551234567"))
            .await
            .unwrap();

        let store: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
        let registry = registry_with(Box::new(MockProvider::new(Channel::Sms)));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let broker_dyn: Arc<dyn BrokerGateway> = broker.clone();
        let handle = tokio::spawn(run(
            Channel::Sms,
            "sms-queue".to_string(),
            "dlq.sms".to_string(),
            broker_dyn,
            store,
            registry,
            retry_cfg(),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(());
        handle.await.unwrap();

        assert!(broker.published_to("dlq.sms").is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_routed_to_dlq_and_acked() {
        let broker = Arc::new(nd_broker::InMemoryBrokerGateway::new());
        broker.publish_to_queue("sms-queue", b"not json").await.unwrap();

        let store: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
        let registry = registry_with(Box::new(MockProvider::new(Channel::Sms)));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let broker_dyn: Arc<dyn BrokerGateway> = broker.clone();
        let handle = tokio::spawn(run(
            Channel::Sms,
            "sms-queue".to_string(),
            "dlq.sms".to_string(),
            broker_dyn,
            store,
            registry,
            retry_cfg(),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(());
        handle.await.unwrap();

        assert_eq!(broker.published_to("dlq.sms"), vec![b"not json".to_vec()]);
    }

    #[tokio::test]
    async fn exhausted_retries_are_routed_to_dlq() {
        let broker = Arc::new(nd_broker::InMemoryBrokerGateway::new());
        let body = notification_body(Channel::Sms, "+15551234567");
        broker.publish_to_queue("sms-queue", &body).await.unwrap();

        let store: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
        struct AlwaysFail;
        #[async_trait::async_trait]
        impl Provider for AlwaysFail {
            fn validate(&self, _n: &nd_common::Notification) -> nd_provider::Result<()> {
                Ok(())
            }
            async fn send(&self, _n: &nd_common::Notification, _deadline: Duration) -> nd_provider::Result<()> {
                Err(nd_provider::ProviderError::Send("always fails".to_string()))
            }
        }
        let registry = registry_with(Box::new(AlwaysFail));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let broker_dyn: Arc<dyn BrokerGateway> = broker.clone();
        let handle = tokio::spawn(run(
            Channel::Sms,
            "sms-queue".to_string(),
            "dlq.sms".to_string(),
            broker_dyn,
            store,
            registry,
            retry_cfg(),
            shutdown_rx,
        ));

        handle.await.unwrap();
        let _ = shutdown_tx.send(());

        assert_eq!(broker.published_to("dlq.sms"), vec![body]);
    }

    #[tokio::test]
    async fn shutdown_mid_backoff_requeues_instead_of_dlq() {
        let broker = Arc::new(nd_broker::InMemoryBrokerGateway::new());
        let body = notification_body(Channel::Sms, "+15551234567");
        broker.publish_to_queue("sms-queue", &body).await.unwrap();

        let store: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
        struct AlwaysFail;
        #[async_trait::async_trait]
        impl Provider for AlwaysFail {
            fn validate(&self, _n: &nd_common::Notification) -> nd_provider::Result<()> {
                Ok(())
            }
            async fn send(&self, _n: &nd_common::Notification, _deadline: Duration) -> nd_provider::Result<()> {
                Err(nd_provider::ProviderError::Send("always fails".to_string()))
            }
        }
        let registry = registry_with(Box::new(AlwaysFail));
        // Long backoff so the first attempt's failure is still sleeping when shutdown fires.
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 5_000,
            max_delay_ms: 5_000,
            process_timeout: Duration::from_secs(1),
        };
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let broker_dyn: Arc<dyn BrokerGateway> = broker.clone();
        let handle = tokio::spawn(run(
            Channel::Sms,
            "sms-queue".to_string(),
            "dlq.sms".to_string(),
            broker_dyn,
            store,
            registry,
            retry,
            shutdown_rx,
        ));

        // Let the first attempt run and fail, landing it in the backoff sleep.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = shutdown_tx.send(());
        handle.await.unwrap();

        assert!(broker.published_to("dlq.sms").is_empty());
    }
}
