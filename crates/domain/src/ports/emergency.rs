use crate::DomainResult;
use crate::emergency::{EmergencyIncident, MedicalProfile, NotificationRecord};
use crate::ports::BoxFuture;

/// Keyed access to the records owned by the external data store.
/// Notification records are append-only.
#[allow(clippy::needless_pass_by_value)]
pub trait EmergencyStore: Send + Sync {
    fn get_profile(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<MedicalProfile>>>;

    fn get_incident(
        &self,
        incident_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<EmergencyIncident>>>;

    fn append_notification(
        &self,
        record: &NotificationRecord,
    ) -> BoxFuture<'_, DomainResult<NotificationRecord>>;

    fn list_notifications(
        &self,
        incident_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<NotificationRecord>>>;
}
