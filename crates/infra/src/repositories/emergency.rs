use std::collections::HashMap;
use std::sync::Arc;

use medid_domain::DomainResult;
use medid_domain::emergency::{
    EmergencyIncident, MedicalProfile, NotificationRecord, NotificationStatus,
};
use medid_domain::error::DomainError;
use medid_domain::ports::BoxFuture;
use medid_domain::ports::emergency::EmergencyStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::RwLock;

#[derive(Default, Clone)]
pub struct InMemoryEmergencyRepository {
    profiles: Arc<RwLock<HashMap<String, MedicalProfile>>>,
    incidents: Arc<RwLock<HashMap<String, EmergencyIncident>>>,
    notifications: Arc<RwLock<Vec<NotificationRecord>>>,
}

impl InMemoryEmergencyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_profile(&self, profile: MedicalProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }

    pub async fn insert_incident(&self, incident: EmergencyIncident) {
        self.incidents
            .write()
            .await
            .insert(incident.incident_id.clone(), incident);
    }
}

impl EmergencyStore for InMemoryEmergencyRepository {
    fn get_profile(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<MedicalProfile>>> {
        let user_id = user_id.to_string();
        let profiles = self.profiles.clone();
        Box::pin(async move { Ok(profiles.read().await.get(&user_id).cloned()) })
    }

    fn get_incident(
        &self,
        incident_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<EmergencyIncident>>> {
        let incident_id = incident_id.to_string();
        let incidents = self.incidents.clone();
        Box::pin(async move { Ok(incidents.read().await.get(&incident_id).cloned()) })
    }

    fn append_notification(
        &self,
        record: &NotificationRecord,
    ) -> BoxFuture<'_, DomainResult<NotificationRecord>> {
        let record = record.clone();
        let notifications = self.notifications.clone();
        Box::pin(async move {
            let mut notifications = notifications.write().await;
            if notifications
                .iter()
                .any(|existing| existing.notification_id == record.notification_id)
            {
                return Err(DomainError::Conflict);
            }
            notifications.push(record.clone());
            Ok(record)
        })
    }

    fn list_notifications(
        &self,
        incident_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<NotificationRecord>>> {
        let incident_id = incident_id.to_string();
        let notifications = self.notifications.clone();
        Box::pin(async move {
            let notifications = notifications.read().await;
            Ok(notifications
                .iter()
                .filter(|record| record.emergency_incident_id == incident_id)
                .cloned()
                .collect())
        })
    }
}

#[derive(Clone)]
pub struct SurrealEmergencyRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealEmergencyRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn parse_rfc3339(value: &str) -> DomainResult<i64> {
        let dt = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|err| DomainError::Storage(format!("invalid timestamp: {err}")))?;
        Ok((dt.unix_timestamp_nanos() / 1_000_000) as i64)
    }

    fn to_rfc3339(epoch_ms: i64) -> DomainResult<String> {
        let dt = OffsetDateTime::from_unix_timestamp_nanos(epoch_ms as i128 * 1_000_000)
            .map_err(|err| DomainError::Storage(format!("invalid ms timestamp: {err}")))?;
        Ok(dt
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string()))
    }

    fn map_surreal_error(err: surrealdb::Error) -> DomainError {
        let error_message = err.to_string().to_lowercase();
        if error_message.contains("already exists") || error_message.contains("duplicate") {
            return DomainError::Conflict;
        }
        DomainError::Storage(format!("surreal query failed: {error_message}"))
    }

    fn decode_row<T: for<'de> Deserialize<'de>>(row: Value, kind: &str) -> DomainResult<T> {
        serde_json::from_value::<T>(row)
            .map_err(|err| DomainError::Storage(format!("invalid {kind} row: {err}")))
    }

    fn decode_notification(row: Value) -> DomainResult<NotificationRecord> {
        let row: SurrealNotificationRow = Self::decode_row(row, "notification")?;
        Ok(NotificationRecord {
            notification_id: row.notification_id,
            user_id: row.user_id,
            emergency_incident_id: row.emergency_incident_id,
            recipient_name: row.recipient_name,
            recipient_phone: row.recipient_phone,
            message_text: row.message_text,
            notification_type: row.notification_type,
            status: row.status.parse::<NotificationStatus>().map_err(|_| {
                DomainError::Storage(format!("invalid notification status '{}'", row.status))
            })?,
            provider: row.provider,
            error_message: row.error_message,
            sent_at_ms: Self::parse_rfc3339(&row.sent_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SurrealProfileRow {
    user_id: String,
    full_name: Option<String>,
    blood_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SurrealIncidentRow {
    incident_id: String,
    user_id: String,
    triggered_at: String,
    location_lat: Option<f64>,
    location_lng: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SurrealNotificationRow {
    notification_id: String,
    user_id: String,
    emergency_incident_id: String,
    recipient_name: String,
    recipient_phone: String,
    message_text: String,
    notification_type: String,
    status: String,
    provider: String,
    error_message: Option<String>,
    sent_at: String,
}

const NOTIFICATION_COLUMNS: &str = "notification_id, user_id, emergency_incident_id, \
    recipient_name, recipient_phone, message_text, notification_type, status, provider, \
    error_message, <string>sent_at AS sent_at";

impl EmergencyStore for SurrealEmergencyRepository {
    fn get_profile(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<MedicalProfile>>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT user_id, full_name, blood_type FROM medical_profile \
                     WHERE user_id = $user_id LIMIT 1",
                )
                .bind(("user_id", user_id))
                .await
                .map_err(Self::map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Storage(format!("invalid query result: {err}")))?;
            let Some(row) = rows.into_iter().next() else {
                return Ok(None);
            };
            let row: SurrealProfileRow = Self::decode_row(row, "profile")?;
            Ok(Some(MedicalProfile {
                user_id: row.user_id,
                full_name: row.full_name,
                blood_type: row.blood_type,
            }))
        })
    }

    fn get_incident(
        &self,
        incident_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<EmergencyIncident>>> {
        let incident_id = incident_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT incident_id, user_id, <string>triggered_at AS triggered_at, \
                            location_lat, location_lng \
                     FROM emergency_incident WHERE incident_id = $incident_id LIMIT 1",
                )
                .bind(("incident_id", incident_id))
                .await
                .map_err(Self::map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Storage(format!("invalid query result: {err}")))?;
            let Some(row) = rows.into_iter().next() else {
                return Ok(None);
            };
            let row: SurrealIncidentRow = Self::decode_row(row, "incident")?;
            Ok(Some(EmergencyIncident {
                incident_id: row.incident_id,
                user_id: row.user_id,
                triggered_at_ms: Self::parse_rfc3339(&row.triggered_at)?,
                location_lat: row.location_lat,
                location_lng: row.location_lng,
            }))
        })
    }

    fn append_notification(
        &self,
        record: &NotificationRecord,
    ) -> BoxFuture<'_, DomainResult<NotificationRecord>> {
        let sent_at = match Self::to_rfc3339(record.sent_at_ms) {
            Ok(sent_at) => sent_at,
            Err(err) => return Box::pin(async move { Err(err) }),
        };
        let record = record.clone();
        let client = self.client.clone();
        Box::pin(async move {
            client
                .query(
                    "CREATE emergency_notification SET \
                        notification_id = $notification_id, \
                        user_id = $user_id, \
                        emergency_incident_id = $emergency_incident_id, \
                        recipient_name = $recipient_name, \
                        recipient_phone = $recipient_phone, \
                        message_text = $message_text, \
                        notification_type = $notification_type, \
                        status = $status, \
                        provider = $provider, \
                        error_message = $error_message, \
                        sent_at = <datetime>$sent_at;",
                )
                .bind(("notification_id", record.notification_id.clone()))
                .bind(("user_id", record.user_id.clone()))
                .bind(("emergency_incident_id", record.emergency_incident_id.clone()))
                .bind(("recipient_name", record.recipient_name.clone()))
                .bind(("recipient_phone", record.recipient_phone.clone()))
                .bind(("message_text", record.message_text.clone()))
                .bind(("notification_type", record.notification_type.clone()))
                .bind(("status", record.status.as_str().to_string()))
                .bind(("provider", record.provider.clone()))
                .bind(("error_message", record.error_message.clone()))
                .bind(("sent_at", sent_at))
                .await
                .map_err(Self::map_surreal_error)?
                .check()
                .map_err(Self::map_surreal_error)?;
            Ok(record)
        })
    }

    fn list_notifications(
        &self,
        incident_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<NotificationRecord>>> {
        let incident_id = incident_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let query = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM emergency_notification \
                 WHERE emergency_incident_id = $incident_id ORDER BY sent_at ASC"
            );
            let mut response = client
                .query(query)
                .bind(("incident_id", incident_id))
                .await
                .map_err(Self::map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Storage(format!("invalid query result: {err}")))?;
            rows.into_iter().map(Self::decode_notification).collect()
        })
    }
}
