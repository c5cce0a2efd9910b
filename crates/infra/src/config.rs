use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub port: u16,
    pub log_level: String,
    pub data_backend: String,
    pub surreal_endpoint: String,
    pub surreal_ns: String,
    pub surreal_db: String,
    pub surreal_user: String,
    pub surreal_pass: String,
    pub request_timeout_ms: u64,
    pub sms_http_timeout_ms: u64,
    pub primary_sms_base_url: String,
    pub primary_sms_username: String,
    pub primary_sms_api_key: String,
    pub primary_sms_sender_id: String,
    pub secondary_sms_base_url: String,
    pub secondary_sms_account_sid: String,
    pub secondary_sms_auth_token: String,
    pub secondary_sms_from_number: String,
    pub audit_per_recipient_status: bool,
    pub rate_limit_period_secs: u64,
    pub rate_limit_burst: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("surreal_endpoint", "ws://127.0.0.1:8000")?
            .set_default("surreal_ns", "medid")?
            .set_default("surreal_db", "emergency")?
            .set_default("surreal_user", "root")?
            .set_default("surreal_pass", "root")?
            .set_default("request_timeout_ms", 30_000)?
            .set_default("sms_http_timeout_ms", 10_000)?
            .set_default(
                "primary_sms_base_url",
                "https://api.africastalking.com/version1",
            )?
            .set_default("primary_sms_username", "")?
            .set_default("primary_sms_api_key", "")?
            .set_default("primary_sms_sender_id", "")?
            .set_default("secondary_sms_base_url", "https://api.twilio.com")?
            .set_default("secondary_sms_account_sid", "")?
            .set_default("secondary_sms_auth_token", "")?
            .set_default("secondary_sms_from_number", "")?
            .set_default("audit_per_recipient_status", false)?
            .set_default("rate_limit_period_secs", 1)?
            .set_default("rate_limit_burst", 20)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn uses_surreal(&self) -> bool {
        self.data_backend.eq_ignore_ascii_case("surreal")
    }
}
