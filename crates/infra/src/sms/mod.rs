use std::sync::Arc;
use std::time::Duration;

use medid_domain::ports::sms::SmsGateway;
use thiserror::Error;

use crate::config::AppConfig;

mod africas_talking;
mod twilio;

pub use africas_talking::{AfricasTalkingCredentials, AfricasTalkingGateway};
pub use twilio::{TwilioCredentials, TwilioGateway};

#[derive(Debug, Error)]
pub enum SmsGatewayError {
    #[error("sms gateway configuration error: {0}")]
    Configuration(String),
    #[error("sms gateway transport error: {0}")]
    Transport(String),
    #[error("sms gateway upstream error: {0}")]
    Upstream(String),
    #[error("sms gateway response decode error: {0}")]
    InvalidResponse(String),
}

pub fn http_client(config: &AppConfig) -> reqwest::Client {
    let timeout = Duration::from_millis(config.sms_http_timeout_ms.max(1));
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Primary batch gateway first, per-message gateway as fallback.
pub fn gateway_chain(config: &AppConfig) -> Vec<Arc<dyn SmsGateway>> {
    let http = http_client(config);
    let primary = AfricasTalkingGateway::from_config(config, http.clone());
    let secondary = TwilioGateway::from_config(config, http);
    tracing::info!(
        primary = primary.id(),
        primary_configured = primary.is_configured(),
        secondary = secondary.id(),
        secondary_configured = secondary.is_configured(),
        "sms gateway chain ready"
    );
    vec![Arc::new(primary) as Arc<dyn SmsGateway>, Arc::new(secondary)]
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
