use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::{
    Json, Router,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use medid_domain::{
    emergency::{DispatchDetails, DispatchRequest, EmergencyContact, NotificationRecord},
    error::DomainError,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::middleware::CorrelationId;
use crate::{
    error::ApiError, middleware as app_middleware, observability, state::AppState, validation,
};

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route(
            "/v1/emergency/notify",
            post(notify_contacts).fallback(method_not_allowed),
        )
        .route(
            "/v1/emergency/incidents/:incident_id/notifications",
            get(list_incident_notifications),
        )
        .route_layer(middleware::from_fn(app_middleware::metrics_layer))
        .layer(app_middleware::timeout_layer(&state.config))
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(middleware::from_fn(
            app_middleware::correlation_id_middleware,
        ))
        .layer(app_middleware::cors_layer());

    if !state.config.app_env.eq_ignore_ascii_case("test") {
        app = app.layer(app_middleware::rate_limit_layer(&state.config));
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
    })
}

async fn metrics() -> Response {
    match observability::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => ApiError::NotFound.into_response(),
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct NotifyContactsRequest {
    #[validate(
        required(message = "userId is required"),
        length(min = 1, message = "userId is required")
    )]
    user_id: Option<String>,
    #[validate(
        required(message = "incidentId is required"),
        length(min = 1, message = "incidentId is required")
    )]
    incident_id: Option<String>,
    #[validate(
        required(message = "contacts are required"),
        length(min = 1, message = "contacts must not be empty")
    )]
    contacts: Option<Vec<ContactPayload>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContactPayload {
    id: Option<String>,
    name: Option<String>,
    phone: Option<String>,
    relationship: Option<String>,
}

impl From<ContactPayload> for EmergencyContact {
    fn from(payload: ContactPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name.unwrap_or_default(),
            phone: payload.phone,
            relationship: payload.relationship,
        }
    }
}

#[derive(Serialize)]
struct NotifyContactsResponse {
    success: bool,
    message: String,
    details: DispatchDetails,
}

async fn notify_contacts(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
    body: Bytes,
) -> Result<Json<NotifyContactsResponse>, ApiError> {
    let payload: NotifyContactsRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::Internal(format!("invalid request body: {err}")))?;
    validation::validate(&payload)?;

    let request = DispatchRequest {
        user_id: payload.user_id.unwrap_or_default(),
        incident_id: payload.incident_id.unwrap_or_default(),
        contacts: payload
            .contacts
            .unwrap_or_default()
            .into_iter()
            .map(EmergencyContact::from)
            .collect(),
    };
    tracing::info!(
        correlation_id = %correlation_id.0,
        user_id = %request.user_id,
        incident_id = %request.incident_id,
        contacts = request.contacts.len(),
        "emergency notification requested"
    );

    let outcome = state
        .dispatcher
        .dispatch(request)
        .await
        .map_err(map_domain_error)?;
    observability::register_sms_dispatch(&outcome);

    Ok(Json(NotifyContactsResponse {
        success: true,
        message: outcome.summary(),
        details: outcome.details,
    }))
}

async fn list_incident_notifications(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<Vec<NotificationRecord>>, ApiError> {
    let records = state
        .dispatcher
        .list_notifications(&incident_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(records))
}

fn map_domain_error(err: DomainError) -> ApiError {
    match err {
        DomainError::Validation(message) => ApiError::Validation(message),
        DomainError::NotFound => ApiError::NotFound,
        DomainError::Conflict | DomainError::Storage(_) => ApiError::Internal(err.to_string()),
    }
}
