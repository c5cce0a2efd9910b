use std::time::{SystemTime, UNIX_EPOCH};

use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};
use uuid::Uuid;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}

pub fn uuid_v7_without_dashes() -> String {
    Uuid::now_v7().simple().to_string()
}

fn datetime_from_ms(epoch_ms: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(epoch_ms as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

pub fn format_ms_rfc3339(epoch_ms: i64) -> String {
    datetime_from_ms(epoch_ms)
        .format(&Rfc3339)
        .unwrap_or("1970-01-01T00:00:00Z".to_string())
}

/// Renders an epoch timestamp the way it appears in outgoing alerts,
/// e.g. `Mar 4, 2025 14:07 UTC`.
pub fn format_ms_human(epoch_ms: i64) -> String {
    let format = format_description!(
        "[month repr:short] [day padding:none], [year] [hour]:[minute] UTC"
    );
    datetime_from_ms(epoch_ms)
        .format(format)
        .unwrap_or_else(|_| format_ms_rfc3339(epoch_ms))
}
