use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use medid_domain::emergency::DispatchOutcome;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const HTTP_REQUESTS_TOTAL: &str = "medid_api_http_requests_total";
const HTTP_REQUEST_DURATION_SECONDS: &str = "medid_api_http_request_duration_seconds";
const HTTP_REQUEST_ERRORS_TOTAL: &str = "medid_api_http_errors_total";
const SMS_DISPATCH_TOTAL: &str = "medid_api_sms_dispatch_total";
const SMS_RECIPIENTS_TOTAL: &str = "medid_api_sms_recipients_total";
const SMS_FALLBACK_TOTAL: &str = "medid_api_sms_fallback_total";
const AUDIT_WRITE_FAILURES_TOTAL: &str = "medid_api_audit_write_failures_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

pub fn register_http_request(method: &str, route: &str, status: StatusCode, elapsed: Duration) {
    let status_code = status.as_u16().to_string();
    let duration_seconds = elapsed.as_secs_f64();
    let result = if status.is_server_error() {
        "error"
    } else {
        "success"
    };

    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_code.clone(),
        "result" => result
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_code
    )
    .record(duration_seconds);

    if status.is_server_error() {
        counter!(
            HTTP_REQUEST_ERRORS_TOTAL,
            "method" => method.to_string(),
            "route" => route.to_string(),
            "status" => status.as_u16().to_string()
        )
        .increment(1);
    }
}

pub fn register_sms_dispatch(outcome: &DispatchOutcome) {
    let result = if outcome.details.success > 0 {
        "delivered"
    } else {
        "failed"
    };

    counter!(
        SMS_DISPATCH_TOTAL,
        "provider" => outcome.provider.clone(),
        "result" => result
    )
    .increment(1);

    counter!(
        SMS_RECIPIENTS_TOTAL,
        "provider" => outcome.provider.clone(),
        "result" => "sent"
    )
    .increment(u64::from(outcome.details.success));
    counter!(
        SMS_RECIPIENTS_TOTAL,
        "provider" => outcome.provider.clone(),
        "result" => "failed"
    )
    .increment(u64::from(outcome.details.failed));

    if outcome.used_fallback() {
        counter!(SMS_FALLBACK_TOTAL, "provider" => outcome.provider.clone()).increment(1);
    }

    if outcome.audit_failures > 0 {
        counter!(AUDIT_WRITE_FAILURES_TOTAL).increment(outcome.audit_failures as u64);
    }
}
