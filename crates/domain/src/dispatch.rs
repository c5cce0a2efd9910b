use std::sync::Arc;

use crate::DomainResult;
use crate::emergency::{
    AlertContext, DispatchDetails, DispatchOutcome, DispatchRequest, EmergencyIncident,
    MedicalProfile, NotificationRecord, NotificationStatus, Recipient, compose_alert_message,
    valid_recipients,
};
use crate::error::DomainError;
use crate::ports::emergency::EmergencyStore;
use crate::ports::sms::SmsGateway;
use crate::sms::{NOTIFICATION_TYPE_SMS, SmsSendResult};
use crate::util::{now_ms, uuid_v7_without_dashes};

const NO_GATEWAY_PROVIDER: &str = "none";

#[derive(Clone, Debug, Default)]
pub struct DispatchConfig {
    /// Take each audit row's status from its own number's outcome instead of
    /// the aggregate of the final gateway attempt.
    pub per_recipient_status: bool,
}

/// Sends emergency SMS alerts through an ordered gateway chain and writes
/// one audit record per recipient.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn EmergencyStore>,
    gateways: Vec<Arc<dyn SmsGateway>>,
    config: DispatchConfig,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn EmergencyStore>,
        gateways: Vec<Arc<dyn SmsGateway>>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            gateways,
            config,
        }
    }

    pub fn gateway_ids(&self) -> Vec<&'static str> {
        self.gateways.iter().map(|gateway| gateway.id()).collect()
    }

    pub async fn dispatch(&self, request: DispatchRequest) -> DomainResult<DispatchOutcome> {
        request.validate()?;

        let recipients = valid_recipients(&request.contacts);
        if recipients.is_empty() {
            return Err(DomainError::Validation("No valid phone numbers found".into()));
        }

        let context = self.load_context(&request).await;
        let message = compose_alert_message(&context);
        let numbers: Vec<String> = recipients
            .iter()
            .map(|recipient| recipient.phone.clone())
            .collect();

        let (result, attempted_providers) = self.deliver(&request, &numbers, &message).await;
        let (records_written, audit_failures) = self
            .record_audit(&request, &recipients, &message, &result)
            .await;

        tracing::info!(
            incident_id = %request.incident_id,
            provider = %result.provider,
            success = result.success,
            failed = result.failed,
            records_written,
            audit_failures,
            "emergency dispatch finished"
        );

        Ok(DispatchOutcome {
            details: DispatchDetails {
                success: result.success,
                failed: result.failed,
                errors: result.errors,
            },
            provider: result.provider,
            attempted_providers,
            records_written,
            audit_failures,
        })
    }

    pub async fn list_notifications(
        &self,
        incident_id: &str,
    ) -> DomainResult<Vec<NotificationRecord>> {
        if incident_id.trim().is_empty() {
            return Err(DomainError::Validation("incident_id is required".into()));
        }
        self.store.list_notifications(incident_id).await
    }

    async fn load_context(&self, request: &DispatchRequest) -> AlertContext {
        let (profile, incident) = tokio::join!(
            self.store.get_profile(&request.user_id),
            self.store.get_incident(&request.incident_id)
        );

        let profile: Option<MedicalProfile> = match profile {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                tracing::warn!(user_id = %request.user_id, "profile not found; using defaults");
                None
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %request.user_id,
                    error = %err,
                    "profile lookup failed; using defaults"
                );
                None
            }
        };

        let incident: Option<EmergencyIncident> = match incident {
            Ok(Some(incident)) => Some(incident),
            Ok(None) => {
                tracing::warn!(
                    incident_id = %request.incident_id,
                    "incident not found; using current time and no location"
                );
                None
            }
            Err(err) => {
                tracing::warn!(
                    incident_id = %request.incident_id,
                    error = %err,
                    "incident lookup failed; using current time and no location"
                );
                None
            }
        };

        AlertContext::resolve(profile.as_ref(), incident.as_ref(), now_ms())
    }

    /// Walks the chain until a gateway delivers to at least one number.
    /// Partial success is final; a later gateway replaces the result only
    /// when the previous one delivered nothing.
    async fn deliver(
        &self,
        request: &DispatchRequest,
        numbers: &[String],
        message: &str,
    ) -> (SmsSendResult, Vec<String>) {
        let mut attempted = Vec::with_capacity(self.gateways.len());
        let mut result: Option<SmsSendResult> = None;

        for gateway in &self.gateways {
            if let Some(previous) = &result {
                if !previous.is_total_failure() {
                    break;
                }
                tracing::warn!(
                    incident_id = %request.incident_id,
                    from = %previous.provider,
                    to = gateway.id(),
                    "sms delivery failed for every number; falling back"
                );
            }

            attempted.push(gateway.id().to_string());
            let attempt = if gateway.is_configured() {
                gateway.send(numbers, message).await
            } else {
                tracing::warn!(provider = gateway.id(), "sms gateway not configured");
                SmsSendResult::unconfigured(gateway.id(), numbers)
            };

            tracing::info!(
                incident_id = %request.incident_id,
                provider = gateway.id(),
                success = attempt.success,
                failed = attempt.failed,
                "sms gateway attempt finished"
            );
            result = Some(attempt);
        }

        let result = result.unwrap_or_else(|| {
            SmsSendResult::all_failed(NO_GATEWAY_PROVIDER, numbers, "no sms gateway available")
        });
        (result, attempted)
    }

    async fn record_audit(
        &self,
        request: &DispatchRequest,
        recipients: &[Recipient],
        message: &str,
        result: &SmsSendResult,
    ) -> (usize, usize) {
        let coarse_status = if result.success > 0 {
            NotificationStatus::Sent
        } else {
            NotificationStatus::Failed
        };
        let coarse_error = if result.errors.is_empty() {
            None
        } else {
            Some(result.errors.join("; "))
        };

        let mut written = 0;
        let mut failures = 0;
        for recipient in recipients {
            let (status, error_message) = match result
                .outcome_for(&recipient.phone)
                .filter(|_| self.config.per_recipient_status)
            {
                Some(outcome) if outcome.delivered => (NotificationStatus::Sent, None),
                Some(outcome) => (
                    NotificationStatus::Failed,
                    outcome.error.clone().or_else(|| coarse_error.clone()),
                ),
                None => (coarse_status.clone(), coarse_error.clone()),
            };

            let record = NotificationRecord {
                notification_id: uuid_v7_without_dashes(),
                user_id: request.user_id.clone(),
                emergency_incident_id: request.incident_id.clone(),
                recipient_name: recipient.name.clone(),
                recipient_phone: recipient.phone.clone(),
                message_text: message.to_string(),
                notification_type: NOTIFICATION_TYPE_SMS.to_string(),
                status,
                provider: result.provider.clone(),
                error_message,
                sent_at_ms: now_ms(),
            };

            match self.store.append_notification(&record).await {
                Ok(_) => written += 1,
                Err(err) => {
                    failures += 1;
                    tracing::error!(
                        incident_id = %request.incident_id,
                        recipient_phone = %recipient.phone,
                        error = %err,
                        "failed to write notification record"
                    );
                }
            }
        }
        (written, failures)
    }
}
