use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use medid_domain::DomainResult;
use medid_domain::dispatch::{DispatchConfig, NotificationDispatcher};
use medid_domain::emergency::{
    DispatchRequest, EmergencyContact, EmergencyIncident, MedicalProfile, NotificationRecord,
    NotificationStatus,
};
use medid_domain::error::DomainError;
use medid_domain::ports::BoxFuture;
use medid_domain::ports::emergency::EmergencyStore;
use medid_domain::ports::sms::SmsGateway;
use medid_domain::sms::{RecipientOutcome, SmsSendResult};

#[derive(Default)]
struct RecordingStore {
    profiles: HashMap<String, MedicalProfile>,
    incidents: HashMap<String, EmergencyIncident>,
    fail_profile_reads: bool,
    fail_writes_for: Vec<String>,
    write_attempts: Mutex<usize>,
    records: Mutex<Vec<NotificationRecord>>,
}

impl RecordingStore {
    fn records(&self) -> Vec<NotificationRecord> {
        self.records.lock().expect("records lock").clone()
    }

    fn write_attempts(&self) -> usize {
        *self.write_attempts.lock().expect("attempts lock")
    }
}

impl EmergencyStore for RecordingStore {
    fn get_profile(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<MedicalProfile>>> {
        let result = if self.fail_profile_reads {
            Err(DomainError::Storage("profile table unavailable".into()))
        } else {
            Ok(self.profiles.get(user_id).cloned())
        };
        Box::pin(async move { result })
    }

    fn get_incident(
        &self,
        incident_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<EmergencyIncident>>> {
        let incident = self.incidents.get(incident_id).cloned();
        Box::pin(async move { Ok(incident) })
    }

    fn append_notification(
        &self,
        record: &NotificationRecord,
    ) -> BoxFuture<'_, DomainResult<NotificationRecord>> {
        let record = record.clone();
        Box::pin(async move {
            *self.write_attempts.lock().expect("attempts lock") += 1;
            if self.fail_writes_for.contains(&record.recipient_phone) {
                return Err(DomainError::Storage("insert rejected".into()));
            }
            self.records
                .lock()
                .expect("records lock")
                .push(record.clone());
            Ok(record)
        })
    }

    fn list_notifications(
        &self,
        incident_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<NotificationRecord>>> {
        let records = self
            .records()
            .into_iter()
            .filter(|record| record.emergency_incident_id == incident_id)
            .collect();
        Box::pin(async move { Ok(records) })
    }
}

/// Delivers to the numbers listed in `deliverable`; fails the rest.
struct ScriptedGateway {
    id: &'static str,
    configured: bool,
    deliverable: Vec<String>,
    calls: Mutex<Vec<(Vec<String>, String)>>,
}

impl ScriptedGateway {
    fn new(id: &'static str, deliverable: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            id,
            configured: true,
            deliverable: deliverable.iter().map(|phone| phone.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn unconfigured(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            configured: false,
            deliverable: Vec::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl SmsGateway for ScriptedGateway {
    fn id(&self) -> &'static str {
        self.id
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn send<'a>(
        &'a self,
        numbers: &'a [String],
        message: &'a str,
    ) -> BoxFuture<'a, SmsSendResult> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("calls lock")
                .push((numbers.to_vec(), message.to_string()));
            let outcomes = numbers
                .iter()
                .map(|phone| {
                    let delivered = self.deliverable.contains(phone);
                    RecipientOutcome {
                        phone: phone.clone(),
                        delivered,
                        error: (!delivered).then(|| "Rejected".to_string()),
                    }
                })
                .collect();
            SmsSendResult::from_outcomes(self.id, outcomes)
        })
    }
}

fn contact(name: &str, phone: Option<&str>) -> EmergencyContact {
    EmergencyContact {
        id: None,
        name: name.to_string(),
        phone: phone.map(str::to_string),
        relationship: Some("sibling".to_string()),
    }
}

fn request(contacts: Vec<EmergencyContact>) -> DispatchRequest {
    DispatchRequest {
        user_id: "u1".to_string(),
        incident_id: "i1".to_string(),
        contacts,
    }
}

fn seeded_store() -> RecordingStore {
    let mut store = RecordingStore::default();
    store.profiles.insert(
        "u1".to_string(),
        MedicalProfile {
            user_id: "u1".to_string(),
            full_name: Some("Amina Otieno".to_string()),
            blood_type: Some("AB-".to_string()),
        },
    );
    store.incidents.insert(
        "i1".to_string(),
        EmergencyIncident {
            incident_id: "i1".to_string(),
            user_id: "u1".to_string(),
            triggered_at_ms: 1_741_097_229_000,
            location_lat: Some(-1.2921),
            location_lng: Some(36.8219),
        },
    );
    store
}

fn dispatcher(
    store: Arc<RecordingStore>,
    gateways: Vec<Arc<ScriptedGateway>>,
    config: DispatchConfig,
) -> NotificationDispatcher {
    let gateways = gateways
        .into_iter()
        .map(|gateway| gateway as Arc<dyn SmsGateway>)
        .collect();
    NotificationDispatcher::new(store, gateways, config)
}

#[tokio::test]
async fn rejects_incomplete_requests_without_side_effects() {
    let store = Arc::new(seeded_store());
    let primary = ScriptedGateway::new("primary", &["+254700111222"]);
    let service = dispatcher(store.clone(), vec![primary.clone()], DispatchConfig::default());

    let mut missing_user = request(vec![contact("Jane", Some("+254700111222"))]);
    missing_user.user_id.clear();
    let mut missing_incident = request(vec![contact("Jane", Some("+254700111222"))]);
    missing_incident.incident_id.clear();
    let no_contacts = request(Vec::new());

    for broken in [missing_user, missing_incident, no_contacts] {
        let err = service.dispatch(broken).await.expect_err("rejected");
        assert!(matches!(err, DomainError::Validation(_)));
    }
    assert!(primary.calls().is_empty());
    assert_eq!(store.write_attempts(), 0);
}

#[tokio::test]
async fn rejects_when_every_phone_is_blank() {
    let store = Arc::new(seeded_store());
    let primary = ScriptedGateway::new("primary", &[]);
    let service = dispatcher(store.clone(), vec![primary.clone()], DispatchConfig::default());

    let err = service
        .dispatch(request(vec![
            contact("Empty", Some("")),
            contact("Spaces", Some("   ")),
            contact("Missing", None),
        ]))
        .await
        .expect_err("rejected");
    assert!(matches!(err, DomainError::Validation(message) if message.contains("No valid phone")));
    assert!(primary.calls().is_empty());
    assert_eq!(store.write_attempts(), 0);
}

#[tokio::test]
async fn example_scenario_sends_one_and_records_one() {
    let store = Arc::new(seeded_store());
    let primary = ScriptedGateway::new("primary", &["+254700111222"]);
    let secondary = ScriptedGateway::new("secondary", &["+254700111222"]);
    let service = dispatcher(
        store.clone(),
        vec![primary.clone(), secondary.clone()],
        DispatchConfig::default(),
    );

    let outcome = service
        .dispatch(request(vec![
            contact("Jane", Some("+254700111222")),
            contact("Bad", Some("")),
        ]))
        .await
        .expect("dispatch");

    assert_eq!(outcome.details.success, 1);
    assert_eq!(outcome.details.failed, 0);
    assert!(outcome.details.errors.is_empty());
    assert_eq!(outcome.summary(), "Sent 1 SMS notifications, 0 failed");
    assert_eq!(primary.calls()[0].0, vec!["+254700111222".to_string()]);
    assert!(secondary.calls().is_empty());

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, NotificationStatus::Sent);
    assert_eq!(records[0].provider, "primary");
    assert_eq!(records[0].recipient_name, "Jane");
    assert_eq!(records[0].notification_type, "sms");
    assert!(records[0].error_message.is_none());
    assert!(records[0].message_text.contains("Amina Otieno"));
    assert!(records[0].message_text.contains("-1.2921, 36.8219"));
    assert!(records[0].message_text.contains("AB-"));
}

#[tokio::test]
async fn unconfigured_primary_falls_back_with_full_number_list() {
    let store = Arc::new(seeded_store());
    let primary = ScriptedGateway::unconfigured("primary");
    let secondary = ScriptedGateway::new("secondary", &["+15550001", "+15550002"]);
    let service = dispatcher(
        store.clone(),
        vec![primary.clone(), secondary.clone()],
        DispatchConfig::default(),
    );
    assert_eq!(service.gateway_ids(), vec!["primary", "secondary"]);

    let outcome = service
        .dispatch(request(vec![
            contact("A", Some(" +15550001 ")),
            contact("B", Some("+15550002")),
            contact("C", Some(" ")),
        ]))
        .await
        .expect("dispatch");

    assert!(primary.calls().is_empty());
    let calls = secondary.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        vec!["+15550001".to_string(), "+15550002".to_string()]
    );
    assert_eq!(outcome.provider, "secondary");
    assert_eq!(outcome.attempted_providers, vec!["primary", "secondary"]);
    assert!(outcome.used_fallback());
    assert_eq!(outcome.details.success, 2);
    assert!(store.records().iter().all(|record| record.provider == "secondary"));
}

#[tokio::test]
async fn partial_primary_success_is_final() {
    let store = Arc::new(seeded_store());
    let primary = ScriptedGateway::new("primary", &["+15550001"]);
    let secondary = ScriptedGateway::new("secondary", &["+15550001", "+15550002"]);
    let service = dispatcher(
        store.clone(),
        vec![primary.clone(), secondary.clone()],
        DispatchConfig::default(),
    );

    let outcome = service
        .dispatch(request(vec![
            contact("A", Some("+15550001")),
            contact("B", Some("+15550002")),
        ]))
        .await
        .expect("dispatch");

    assert!(secondary.calls().is_empty());
    assert_eq!(outcome.details.success, 1);
    assert_eq!(outcome.details.failed, 1);
    assert_eq!(outcome.details.errors, vec!["+15550002: Rejected"]);

    // Coarse audit: every row carries the aggregate status.
    let records = store.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.status == NotificationStatus::Sent));
    assert!(
        records
            .iter()
            .all(|record| record.error_message.as_deref() == Some("+15550002: Rejected"))
    );
}

#[tokio::test]
async fn per_recipient_status_uses_each_numbers_outcome() {
    let store = Arc::new(seeded_store());
    let primary = ScriptedGateway::new("primary", &["+15550001"]);
    let service = dispatcher(
        store.clone(),
        vec![primary],
        DispatchConfig {
            per_recipient_status: true,
        },
    );

    service
        .dispatch(request(vec![
            contact("A", Some("+15550001")),
            contact("B", Some("+15550002")),
        ]))
        .await
        .expect("dispatch");

    let records = store.records();
    let a = records
        .iter()
        .find(|record| record.recipient_phone == "+15550001")
        .expect("record a");
    let b = records
        .iter()
        .find(|record| record.recipient_phone == "+15550002")
        .expect("record b");
    assert_eq!(a.status, NotificationStatus::Sent);
    assert!(a.error_message.is_none());
    assert_eq!(b.status, NotificationStatus::Failed);
    assert_eq!(b.error_message.as_deref(), Some("Rejected"));
}

#[tokio::test]
async fn total_failure_still_completes_and_audits_every_recipient() {
    let store = Arc::new(seeded_store());
    let primary = ScriptedGateway::new("primary", &[]);
    let secondary = ScriptedGateway::new("secondary", &[]);
    let service = dispatcher(
        store.clone(),
        vec![primary.clone(), secondary.clone()],
        DispatchConfig::default(),
    );

    let outcome = service
        .dispatch(request(vec![
            contact("A", Some("+15550001")),
            contact("B", Some("+15550002")),
            contact("C", Some("+15550003")),
        ]))
        .await
        .expect("dispatch completes");

    assert_eq!(primary.calls().len(), 1);
    assert_eq!(secondary.calls().len(), 1);
    assert_eq!(outcome.details.success, 0);
    assert_eq!(outcome.details.failed, 3);
    assert_eq!(store.write_attempts(), 3);
    let records = store.records();
    assert!(records.iter().all(|record| record.status == NotificationStatus::Failed));
    assert!(records.iter().all(|record| record.provider == "secondary"));
}

#[tokio::test]
async fn profile_read_failure_degrades_to_defaults() {
    let mut store = seeded_store();
    store.fail_profile_reads = true;
    store.incidents.clear();
    let store = Arc::new(store);
    let primary = ScriptedGateway::new("primary", &["+15550001"]);
    let service = dispatcher(store.clone(), vec![primary.clone()], DispatchConfig::default());

    service
        .dispatch(request(vec![contact("A", Some("+15550001"))]))
        .await
        .expect("dispatch");

    let calls = primary.calls();
    assert_eq!(calls.len(), 1);
    let message = &calls[0].1;
    assert!(message.contains("Someone"));
    assert!(message.contains("Unknown"));
    assert!(message.contains("Location unavailable"));
}

#[tokio::test]
async fn audit_write_failure_does_not_stop_remaining_writes() {
    let mut store = seeded_store();
    store.fail_writes_for = vec!["+15550001".to_string()];
    let store = Arc::new(store);
    let primary = ScriptedGateway::new("primary", &["+15550001", "+15550002"]);
    let service = dispatcher(store.clone(), vec![primary], DispatchConfig::default());

    let outcome = service
        .dispatch(request(vec![
            contact("A", Some("+15550001")),
            contact("B", Some("+15550002")),
        ]))
        .await
        .expect("dispatch");

    assert_eq!(store.write_attempts(), 2);
    assert_eq!(outcome.records_written, 1);
    assert_eq!(outcome.audit_failures, 1);
    assert_eq!(outcome.details.success, 2);
}

#[tokio::test]
async fn repeated_dispatch_sends_and_records_again() {
    let store = Arc::new(seeded_store());
    let primary = ScriptedGateway::new("primary", &["+15550001", "+15550002"]);
    let service = dispatcher(store.clone(), vec![primary.clone()], DispatchConfig::default());
    let contacts = vec![
        contact("A", Some("+15550001")),
        contact("B", Some("+15550002")),
    ];

    service
        .dispatch(request(contacts.clone()))
        .await
        .expect("first dispatch");
    service
        .dispatch(request(contacts))
        .await
        .expect("second dispatch");

    assert_eq!(primary.calls().len(), 2);
    assert_eq!(store.records().len(), 4);
    let listed = service.list_notifications("i1").await.expect("list");
    assert_eq!(listed.len(), 4);
}

#[tokio::test]
async fn empty_gateway_chain_fails_every_recipient() {
    let store = Arc::new(seeded_store());
    let service = dispatcher(store.clone(), Vec::new(), DispatchConfig::default());

    let outcome = service
        .dispatch(request(vec![contact("A", Some("+15550001"))]))
        .await
        .expect("dispatch");

    assert_eq!(outcome.provider, "none");
    assert_eq!(outcome.details.failed, 1);
    assert_eq!(store.records()[0].status, NotificationStatus::Failed);
}
