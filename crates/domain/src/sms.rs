use serde::{Deserialize, Serialize};

pub const NOTIFICATION_TYPE_SMS: &str = "sms";

/// Delivery outcome for a single number as reported by a gateway.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub phone: String,
    pub delivered: bool,
    pub error: Option<String>,
}

/// Aggregate result of one gateway attempt over a batch of numbers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmsSendResult {
    pub provider: String,
    pub success: u32,
    pub failed: u32,
    pub errors: Vec<String>,
    pub recipients: Vec<RecipientOutcome>,
}

impl SmsSendResult {
    pub fn from_outcomes(provider: impl Into<String>, recipients: Vec<RecipientOutcome>) -> Self {
        let mut success = 0;
        let mut failed = 0;
        let mut errors = Vec::new();
        for outcome in &recipients {
            if outcome.delivered {
                success += 1;
            } else {
                failed += 1;
                let reason = outcome.error.as_deref().unwrap_or("delivery failed");
                errors.push(format!("{}: {reason}", outcome.phone));
            }
        }
        Self {
            provider: provider.into(),
            success,
            failed,
            errors,
            recipients,
        }
    }

    /// Every number failed for the same reason: the gateway was never reached
    /// or its response could not be trusted.
    pub fn all_failed(provider: impl Into<String>, numbers: &[String], reason: &str) -> Self {
        let recipients = numbers
            .iter()
            .map(|phone| RecipientOutcome {
                phone: phone.clone(),
                delivered: false,
                error: Some(reason.to_string()),
            })
            .collect();
        Self {
            provider: provider.into(),
            success: 0,
            failed: numbers.len() as u32,
            errors: vec![reason.to_string()],
            recipients,
        }
    }

    pub fn unconfigured(provider: &str, numbers: &[String]) -> Self {
        Self::all_failed(
            provider,
            numbers,
            &format!("{provider} gateway is not configured"),
        )
    }

    pub fn is_total_failure(&self) -> bool {
        self.success == 0 && self.failed > 0
    }

    pub fn outcome_for(&self, phone: &str) -> Option<&RecipientOutcome> {
        self.recipients.iter().find(|outcome| outcome.phone == phone)
    }
}
