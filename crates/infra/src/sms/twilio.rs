use medid_domain::ports::BoxFuture;
use medid_domain::ports::sms::SmsGateway;
use medid_domain::sms::{RecipientOutcome, SmsSendResult};
use serde::Deserialize;

use super::{SmsGatewayError, endpoint_url, non_blank};
use crate::config::AppConfig;

const PROVIDER_ID: &str = "twilio";

#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TwilioCredentials {
    pub fn from_parts(account_sid: &str, auth_token: &str, from_number: &str) -> Option<Self> {
        Some(Self {
            account_sid: non_blank(account_sid)?,
            auth_token: non_blank(auth_token)?,
            from_number: non_blank(from_number)?,
        })
    }
}

/// Per-message gateway: no batch API, so numbers are sent one at a time.
#[derive(Debug, Clone)]
pub struct TwilioGateway {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<TwilioCredentials>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    sid: Option<String>,
    status: Option<String>,
}

impl TwilioGateway {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Option<TwilioCredentials>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
        }
    }

    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Self {
        let credentials = TwilioCredentials::from_parts(
            &config.secondary_sms_account_sid,
            &config.secondary_sms_auth_token,
            &config.secondary_sms_from_number,
        );
        Self::new(http, config.secondary_sms_base_url.clone(), credentials)
    }

    async fn send_one(&self, to: &str, body: &str) -> Result<(), SmsGatewayError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            SmsGatewayError::Configuration(
                "account sid, auth token and from number are required".to_string(),
            )
        })?;

        let path = format!(
            "2010-04-01/Accounts/{}/Messages.json",
            credentials.account_sid
        );
        let response = self
            .http
            .post(endpoint_url(&self.base_url, &path))
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&[
                ("To", to),
                ("From", credentials.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|err| SmsGatewayError::Transport(err.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            if let Ok(message) = serde_json::from_str::<MessageBody>(&text) {
                tracing::debug!(
                    provider = PROVIDER_ID,
                    sid = message.sid.as_deref().unwrap_or("-"),
                    status = message.status.as_deref().unwrap_or("-"),
                    "sms queued"
                );
            }
            return Ok(());
        }

        let detail = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(ErrorBody {
                code: Some(code),
                message: Some(message),
            }) => format!("{message} (code {code})"),
            Ok(ErrorBody {
                message: Some(message),
                ..
            }) => message,
            _ => format!("status {}", status.as_u16()),
        };
        Err(SmsGatewayError::Upstream(detail))
    }
}

impl SmsGateway for TwilioGateway {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn send<'a>(
        &'a self,
        numbers: &'a [String],
        message: &'a str,
    ) -> BoxFuture<'a, SmsSendResult> {
        Box::pin(async move {
            let mut outcomes = Vec::with_capacity(numbers.len());
            for phone in numbers {
                let outcome = match self.send_one(phone, message).await {
                    Ok(()) => RecipientOutcome {
                        phone: phone.clone(),
                        delivered: true,
                        error: None,
                    },
                    Err(err) => {
                        tracing::warn!(
                            provider = PROVIDER_ID,
                            phone = %phone,
                            error = %err,
                            "sms send failed"
                        );
                        RecipientOutcome {
                            phone: phone.clone(),
                            delivered: false,
                            error: Some(err.to_string()),
                        }
                    }
                };
                outcomes.push(outcome);
            }
            SmsSendResult::from_outcomes(PROVIDER_ID, outcomes)
        })
    }
}
