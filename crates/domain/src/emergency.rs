use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DomainError;
use crate::util::format_ms_human;

pub const DEFAULT_SENDER_NAME: &str = "Someone";
pub const DEFAULT_BLOOD_TYPE: &str = "Unknown";
pub const LOCATION_UNAVAILABLE: &str = "Location unavailable";

/// The slice of a medical profile the dispatcher reads.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicalProfile {
    pub user_id: String,
    pub full_name: Option<String>,
    pub blood_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmergencyIncident {
    pub incident_id: String,
    pub user_id: String,
    pub triggered_at_ms: i64,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
}

impl EmergencyIncident {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.location_lat, self.location_lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyContact {
    pub id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub relationship: Option<String>,
}

impl EmergencyContact {
    /// Trimmed phone number, or `None` when missing or blank.
    pub fn valid_phone(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub phone: String,
}

/// Contacts with a usable phone number, in input order.
pub fn valid_recipients(contacts: &[EmergencyContact]) -> Vec<Recipient> {
    contacts
        .iter()
        .filter_map(|contact| {
            contact.valid_phone().map(|phone| Recipient {
                name: contact.name.clone(),
                phone: phone.to_string(),
            })
        })
        .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DispatchRequest {
    pub user_id: String,
    pub incident_id: String,
    pub contacts: Vec<EmergencyContact>,
}

impl DispatchRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.user_id.is_empty() || self.incident_id.is_empty() || self.contacts.is_empty() {
            return Err(DomainError::Validation(
                "Missing required fields: userId, incidentId, contacts".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err("unknown notification status"),
        }
    }
}

/// Audit row written once per recipient after delivery concludes. Never updated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub notification_id: String,
    pub user_id: String,
    pub emergency_incident_id: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub message_text: String,
    pub notification_type: String,
    pub status: NotificationStatus,
    pub provider: String,
    pub error_message: Option<String>,
    pub sent_at_ms: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchDetails {
    pub success: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DispatchOutcome {
    pub details: DispatchDetails,
    /// Gateway whose result is final; empty only if the chain was empty.
    pub provider: String,
    pub attempted_providers: Vec<String>,
    pub records_written: usize,
    pub audit_failures: usize,
}

impl DispatchOutcome {
    pub fn summary(&self) -> String {
        format!(
            "Sent {} SMS notifications, {} failed",
            self.details.success, self.details.failed
        )
    }

    pub fn used_fallback(&self) -> bool {
        self.attempted_providers.len() > 1
    }
}

/// Medical context embedded in the alert text.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertContext {
    pub name: String,
    pub blood_type: String,
    pub coordinates: Option<(f64, f64)>,
    pub triggered_at_ms: i64,
}

impl AlertContext {
    /// Missing or blank values fall back to the fixed defaults; a missing
    /// incident falls back to `now_ms`.
    pub fn resolve(
        profile: Option<&MedicalProfile>,
        incident: Option<&EmergencyIncident>,
        now_ms: i64,
    ) -> Self {
        let name = profile
            .and_then(|profile| non_blank(profile.full_name.as_deref()))
            .unwrap_or(DEFAULT_SENDER_NAME)
            .to_string();
        let blood_type = profile
            .and_then(|profile| non_blank(profile.blood_type.as_deref()))
            .unwrap_or(DEFAULT_BLOOD_TYPE)
            .to_string();
        Self {
            name,
            blood_type,
            coordinates: incident.and_then(EmergencyIncident::coordinates),
            triggered_at_ms: incident.map_or(now_ms, |incident| incident.triggered_at_ms),
        }
    }

    pub fn location_text(&self) -> String {
        match self.coordinates {
            Some((lat, lng)) => format!("{lat:.4}, {lng:.4}"),
            None => LOCATION_UNAVAILABLE.to_string(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn compose_alert_message(context: &AlertContext) -> String {
    format!(
        "EMERGENCY ALERT: {name} has triggered an SOS and may need help.\n\
         Location: {location}\n\
         Blood type: {blood_type}\n\
         Time: {time}\n\
         Please call them or contact emergency services immediately.",
        name = context.name,
        location = context.location_text(),
        blood_type = context.blood_type,
        time = format_ms_human(context.triggered_at_ms),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: &str, phone: Option<&str>) -> EmergencyContact {
        EmergencyContact {
            name: name.to_string(),
            phone: phone.map(str::to_string),
            ..EmergencyContact::default()
        }
    }

    #[test]
    fn valid_recipients_drops_blank_and_missing_phones() {
        let contacts = vec![
            contact("Jane", Some(" +254700111222 ")),
            contact("Empty", Some("")),
            contact("Spaces", Some("   ")),
            contact("Missing", None),
        ];
        let recipients = valid_recipients(&contacts);
        assert_eq!(
            recipients,
            vec![Recipient {
                name: "Jane".into(),
                phone: "+254700111222".into()
            }]
        );
    }

    #[test]
    fn validate_rejects_empty_identifiers_and_contacts() {
        let request = DispatchRequest {
            user_id: "u1".into(),
            incident_id: "i1".into(),
            contacts: vec![contact("Jane", Some("+1"))],
        };
        assert!(request.validate().is_ok());

        for broken in [
            DispatchRequest {
                user_id: String::new(),
                ..request.clone()
            },
            DispatchRequest {
                incident_id: String::new(),
                ..request.clone()
            },
            DispatchRequest {
                contacts: Vec::new(),
                ..request.clone()
            },
        ] {
            let err = broken.validate().expect_err("should reject");
            assert!(matches!(err, DomainError::Validation(message) if message.contains("Missing")));
        }
    }

    #[test]
    fn message_uses_defaults_when_context_missing() {
        let context = AlertContext::resolve(None, None, 1_741_097_229_000);
        let message = compose_alert_message(&context);
        assert!(message.contains("Someone has triggered"));
        assert!(message.contains("Blood type: Unknown"));
        assert!(message.contains("Location: Location unavailable"));
        assert!(message.contains("Mar 4, 2025 14:07 UTC"));
    }

    #[test]
    fn message_renders_coordinates_with_four_decimals() {
        let profile = MedicalProfile {
            user_id: "u1".into(),
            full_name: Some("Amina Otieno".into()),
            blood_type: Some("O+".into()),
        };
        let incident = EmergencyIncident {
            incident_id: "i1".into(),
            user_id: "u1".into(),
            triggered_at_ms: 0,
            location_lat: Some(-1.292_066_123),
            location_lng: Some(36.821_945_9),
        };
        let context = AlertContext::resolve(Some(&profile), Some(&incident), 99);
        assert_eq!(context.triggered_at_ms, 0);
        let message = compose_alert_message(&context);
        assert!(message.contains("Amina Otieno has triggered"));
        assert!(message.contains("Location: -1.2921, 36.8219"));
        assert!(message.contains("Blood type: O+"));
    }

    #[test]
    fn half_known_location_is_unavailable() {
        let incident = EmergencyIncident {
            incident_id: "i1".into(),
            user_id: "u1".into(),
            triggered_at_ms: 0,
            location_lat: Some(1.0),
            location_lng: None,
        };
        let context = AlertContext::resolve(None, Some(&incident), 0);
        assert_eq!(context.location_text(), LOCATION_UNAVAILABLE);
    }
}
