use std::sync::Arc;
use std::time::Duration;

use nd_broker::BrokerGateway;
use nd_config::AppConfig;
use nd_provider::ProviderRegistry;
use nd_store::PgNotificationStore;

pub struct AppState {
    pub registry: ProviderRegistry,
    pub store: PgNotificationStore,
    pub broker: Arc<dyn BrokerGateway>,
    pub request_timeout: Duration,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        registry: ProviderRegistry,
        store: PgNotificationStore,
        broker: Arc<dyn BrokerGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            registry,
            store,
            broker,
            request_timeout: config.server.request_timeout,
        }
    }
}
