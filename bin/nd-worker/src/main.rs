//! Worker service: one concurrent consumer per channel, each running the
//! retry state machine and routing exhausted deliveries to the DLQ.

mod consumer;
mod retry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use nd_broker::{AmqpBrokerGateway, BrokerGateway};
use nd_common::Channel;
use nd_config::AppConfig;
use nd_provider::{MockProvider, Provider, ProviderRegistry, SendGridEmailProvider, SlackChatProvider, TwilioSmsProvider};
use nd_store::{NotificationStore, PgNotificationStore};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    nd_common::logging::init("nd-worker");
    info!("starting notification worker service");

    let config = AppConfig::from_env()?;

    let store: Arc<dyn NotificationStore> = Arc::new(
        PgNotificationStore::connect(
            &config.database.connection_url(),
            config.database.max_connections,
            config.database.min_connections,
            config.database.query_timeout,
        )
        .await?,
    );
    info!("connected to datastore");

    let amqp_broker = Arc::new(AmqpBrokerGateway::connect(&config.broker.amqp_url()).await?);
    amqp_broker
        .declare_topology(&config.broker.channel_queues, &config.broker.dlq_prefix)
        .await?;
    info!("declared broker topology");
    let broker: Arc<dyn BrokerGateway> = amqp_broker;

    let registry = Arc::new(build_registry(&config));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut handles = Vec::new();
    for channel in Channel::ALL {
        let Some(queue_name) = config.broker.queue_for(channel) else {
            continue;
        };
        let queue_name = queue_name.to_string();
        let dlq_queue_name = config.broker.dlq_for(channel);
        let broker = broker.clone();
        let store = store.clone();
        let registry = registry.clone();
        let retry = config.retry.clone();
        let shutdown_rx = shutdown_tx.subscribe();

        handles.push(tokio::spawn(async move {
            consumer::run(channel, queue_name, dlq_queue_name, broker, store, registry, retry, shutdown_rx).await;
        }));
    }

    info!("worker service started, press Ctrl+C to shutdown");
    shutdown_signal().await;
    info!("shutdown signal received, draining in-flight deliveries");

    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(30), futures_util::future::join_all(handles)).await;

    let _ = broker.close().await;
    info!("worker service shutdown complete");
    Ok(())
}

fn build_registry(config: &AppConfig) -> ProviderRegistry {
    if config.use_mock_providers {
        info!("using mock providers (USE_MOCK_PROVIDERS=true)");
        return ProviderRegistry::new(
            Box::new(MockProvider::new(Channel::Sms)),
            Box::new(MockProvider::new(Channel::Email)),
            Box::new(MockProvider::new(Channel::Slack)),
        );
    }

    ProviderRegistry::new(
        Box::new(TwilioSmsProvider::new(config.twilio.clone())) as Box<dyn Provider>,
        Box::new(SendGridEmailProvider::new(config.sendgrid.clone())) as Box<dyn Provider>,
        Box::new(SlackChatProvider::new(config.slack.clone())) as Box<dyn Provider>,
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
