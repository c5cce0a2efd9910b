use medid_domain::ports::BoxFuture;
use medid_domain::ports::sms::SmsGateway;
use medid_domain::sms::{RecipientOutcome, SmsSendResult};
use serde::Deserialize;

use super::{SmsGatewayError, endpoint_url, non_blank};
use crate::config::AppConfig;

const PROVIDER_ID: &str = "africastalking";
const DELIVERED_STATUS: &str = "Success";

#[derive(Debug, Clone)]
pub struct AfricasTalkingCredentials {
    pub username: String,
    pub api_key: String,
    pub sender_id: Option<String>,
}

impl AfricasTalkingCredentials {
    /// `None` unless both username and api key are present.
    pub fn from_parts(username: &str, api_key: &str, sender_id: &str) -> Option<Self> {
        Some(Self {
            username: non_blank(username)?,
            api_key: non_blank(api_key)?,
            sender_id: non_blank(sender_id),
        })
    }
}

/// Batch gateway: all numbers go out in one request and the provider
/// answers with one status per number.
#[derive(Debug, Clone)]
pub struct AfricasTalkingGateway {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<AfricasTalkingCredentials>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(rename = "SMSMessageData")]
    data: MessageData,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Recipients", default)]
    recipients: Vec<RecipientStatus>,
}

#[derive(Debug, Deserialize)]
struct RecipientStatus {
    number: String,
    status: String,
    #[serde(rename = "statusCode")]
    status_code: Option<i64>,
    #[serde(rename = "messageId")]
    message_id: Option<String>,
}

impl AfricasTalkingGateway {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Option<AfricasTalkingCredentials>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
        }
    }

    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Self {
        let credentials = AfricasTalkingCredentials::from_parts(
            &config.primary_sms_username,
            &config.primary_sms_api_key,
            &config.primary_sms_sender_id,
        );
        Self::new(http, config.primary_sms_base_url.clone(), credentials)
    }

    async fn send_batch(
        &self,
        numbers: &[String],
        message: &str,
    ) -> Result<Vec<RecipientOutcome>, SmsGatewayError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            SmsGatewayError::Configuration("username and api key are required".to_string())
        })?;

        let to = numbers.join(",");
        let mut form = vec![
            ("username", credentials.username.as_str()),
            ("to", to.as_str()),
            ("message", message),
        ];
        if let Some(sender_id) = credentials.sender_id.as_deref() {
            form.push(("from", sender_id));
        }

        let response = self
            .http
            .post(endpoint_url(&self.base_url, "messaging"))
            .header("accept", "application/json")
            .header("apiKey", &credentials.api_key)
            .form(&form)
            .send()
            .await
            .map_err(|err| SmsGatewayError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SmsGatewayError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(SmsGatewayError::Upstream(format!(
                "status {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let parsed: SendResponse = serde_json::from_str(&body)
            .map_err(|err| SmsGatewayError::InvalidResponse(err.to_string()))?;
        tracing::debug!(
            provider = PROVIDER_ID,
            summary = %parsed.data.message,
            recipients = parsed.data.recipients.len(),
            "batch send acknowledged"
        );
        let MessageData {
            message: batch_message,
            recipients,
        } = parsed.data;
        Ok(match_outcomes(numbers, recipients, &batch_message))
    }
}

const NATIONAL_DIGITS: usize = 9;
const NO_STATUS: &str = "no delivery status returned";

/// Pairs submitted numbers with reported statuses. Statuses are matched by
/// exact number, then by trailing national digits since the provider may
/// rewrite a local number into international form, then by position among
/// whatever is still unpaired when the leftover counts agree. Anything left
/// unmatched is failed with the batch-level message when the provider
/// returned no per-number statuses at all.
fn match_outcomes(
    numbers: &[String],
    recipients: Vec<RecipientStatus>,
    batch_message: &str,
) -> Vec<RecipientOutcome> {
    let mut claimed = vec![false; recipients.len()];
    let mut paired: Vec<Option<usize>> = vec![None; numbers.len()];

    for (slot, phone) in paired.iter_mut().zip(numbers) {
        *slot = claim(&mut claimed, &recipients, |status| &status.number == phone);
    }
    for (slot, phone) in paired.iter_mut().zip(numbers) {
        if slot.is_none() {
            let wanted = national_digits(phone);
            *slot = claim(&mut claimed, &recipients, |status| {
                !wanted.is_empty() && national_digits(&status.number) == wanted
            });
        }
    }
    let unpaired = paired.iter().filter(|slot| slot.is_none()).count();
    let unclaimed = claimed.iter().filter(|taken| !**taken).count();
    if unpaired > 0 && unpaired == unclaimed {
        for slot in paired.iter_mut().filter(|slot| slot.is_none()) {
            *slot = claim(&mut claimed, &recipients, |_| true);
        }
    }

    let missing_reason = match batch_message.trim() {
        reason if recipients.is_empty() && !reason.is_empty() => reason.to_string(),
        _ => NO_STATUS.to_string(),
    };

    numbers
        .iter()
        .zip(paired)
        .map(|(phone, slot)| match slot.map(|index| &recipients[index]) {
            Some(status) if status.status == DELIVERED_STATUS => {
                tracing::debug!(
                    provider = PROVIDER_ID,
                    phone = %phone,
                    message_id = status.message_id.as_deref().unwrap_or("-"),
                    "sms accepted"
                );
                RecipientOutcome {
                    phone: phone.clone(),
                    delivered: true,
                    error: None,
                }
            }
            Some(status) => RecipientOutcome {
                phone: phone.clone(),
                delivered: false,
                error: Some(match status.status_code {
                    Some(code) => format!("{} ({code})", status.status),
                    None => status.status.clone(),
                }),
            },
            None => RecipientOutcome {
                phone: phone.clone(),
                delivered: false,
                error: Some(missing_reason.clone()),
            },
        })
        .collect()
}

/// First unclaimed status accepted by `accept`, marked as claimed.
fn claim(
    claimed: &mut [bool],
    recipients: &[RecipientStatus],
    accept: impl Fn(&RecipientStatus) -> bool,
) -> Option<usize> {
    let index = recipients
        .iter()
        .enumerate()
        .position(|(index, status)| !claimed[index] && accept(status))?;
    claimed[index] = true;
    Some(index)
}

fn national_digits(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let skip = digits.len().saturating_sub(NATIONAL_DIGITS);
    digits[skip..].iter().collect()
}

impl SmsGateway for AfricasTalkingGateway {
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
            match self.send_batch(numbers, message).await {
                Ok(outcomes) => SmsSendResult::from_outcomes(PROVIDER_ID, outcomes),
                Err(err) => {
                    tracing::warn!(provider = PROVIDER_ID, error = %err, "batch sms send failed");
                    SmsSendResult::all_failed(PROVIDER_ID, numbers, &err.to_string())
                }
            }
        })
    }
}
