use std::sync::Arc;

use medid_domain::dispatch::{DispatchConfig, NotificationDispatcher};
use medid_domain::ports::emergency::EmergencyStore;
use medid_domain::ports::sms::SmsGateway;
use medid_infra::config::AppConfig;
use medid_infra::db::{self, DbConfig};
use medid_infra::repositories::{InMemoryEmergencyRepository, SurrealEmergencyRepository};
use medid_infra::sms;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: NotificationDispatcher,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn EmergencyStore> = if config.uses_surreal() {
            let client = db::connect(&DbConfig::from_app_config(&config)).await?;
            Arc::new(SurrealEmergencyRepository::with_client(client))
        } else {
            tracing::warn!(
                data_backend = %config.data_backend,
                "using in-memory emergency store; records are lost on restart"
            );
            Arc::new(InMemoryEmergencyRepository::new())
        };
        let gateways = sms::gateway_chain(&config);
        Ok(Self::with_components(config, store, gateways))
    }

    pub fn with_components(
        config: AppConfig,
        store: Arc<dyn EmergencyStore>,
        gateways: Vec<Arc<dyn SmsGateway>>,
    ) -> Self {
        let dispatch_config = DispatchConfig {
            per_recipient_status: config.audit_per_recipient_status,
        };
        let dispatcher = NotificationDispatcher::new(store, gateways, dispatch_config);
        tracing::info!(
            gateways = ?dispatcher.gateway_ids(),
            per_recipient_status = config.audit_per_recipient_status,
            "notification dispatcher ready"
        );
        Self { config, dispatcher }
    }
}
