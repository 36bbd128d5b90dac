//! Intake service: accepts notification submissions over HTTP, validates
//! and persists them, and publishes them onto the broker for the worker
//! service to pick up.

mod http;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use nd_broker::{AmqpBrokerGateway, BrokerGateway};
use nd_config::AppConfig;
use nd_provider::{Provider, ProviderRegistry, SendGridEmailProvider, SlackChatProvider, TwilioSmsProvider};
use nd_store::PgNotificationStore;
use tokio::signal;
use tracing::info;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    nd_common::logging::init("nd-intake");
    info!("starting notification intake service");

    let config = AppConfig::from_env()?;

    let store = PgNotificationStore::connect(
        &config.database.connection_url(),
        config.database.max_connections,
        config.database.min_connections,
        config.database.query_timeout,
    )
    .await?;
    store.init_schema().await?;
    info!("connected to datastore");

    let amqp_broker = AmqpBrokerGateway::connect(&config.broker.amqp_url()).await?;
    amqp_broker
        .declare_topology(&config.broker.channel_queues, &config.broker.dlq_prefix)
        .await?;
    info!("declared broker topology");
    let broker: Arc<dyn BrokerGateway> = Arc::new(amqp_broker);

    let registry = build_registry(&config);

    let state = Arc::new(AppState::new(registry, store, broker, &config));

    let app = http::router(state.clone());
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "intake service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("closing broker connection");
    let _ = tokio::time::timeout(Duration::from_secs(5), state.broker.close()).await;

    info!("intake service shutdown complete");
    Ok(())
}

/// `USE_MOCK_PROVIDERS` only ever swaps providers on the worker side, where
/// delivery actually happens — intake only validates and enqueues, so it
/// always talks to the real providers.
fn build_registry(config: &AppConfig) -> ProviderRegistry {
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
