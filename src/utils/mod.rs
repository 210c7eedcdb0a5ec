//! Clock and document-link helpers.

use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

/// Current wall-clock time in microseconds since the Unix epoch
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Absolute expiry `lifetime` from now, in microseconds
pub fn expiration_from_now(lifetime: Duration) -> i64 {
    let lifetime_micros = i64::try_from(lifetime.as_micros()).unwrap_or(i64::MAX);
    now_micros().saturating_add(lifetime_micros)
}

/// Join a factory link and a document id into a self link
pub fn build_link(factory_link: &str, id: &str) -> String {
    format!(
        "{}/{}",
        factory_link.trim_end_matches('/'),
        id.trim_start_matches('/')
    )
}

/// Derive a stable document id from an endpoint.
///
/// Every character outside `[A-Za-z0-9]` is replaced by one `-`, so
/// endpoints differing only in punctuation keep different ids. A missing or
/// blank endpoint gets a random id.
pub fn id_from_endpoint(endpoint: Option<&str>) -> String {
    match endpoint.filter(|e| !e.trim().is_empty()) {
        Some(endpoint) => endpoint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect(),
        None => Uuid::new_v4().to_string(),
    }
}
