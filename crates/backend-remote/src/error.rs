//! Mapping of transport and HTTP failures into the core error taxonomy,
//! plus the retry policy used by the change poller.

use taskflow_core::StoreError;

/// Retry policy class for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> ApiRetryClass {
    match status {
        401 | 403 => ApiRetryClass::ReauthRequired,
        408 | 409 | 423 | 425 | 429 => ApiRetryClass::Retryable,
        500..=599 => ApiRetryClass::Retryable,
        _ => ApiRetryClass::Permanent,
    }
}

/// Classify a core error for the poller's retry decision.
pub fn retry_class(err: &StoreError) -> ApiRetryClass {
    match err {
        StoreError::RemoteUnavailable(_) => ApiRetryClass::Retryable,
        // No status means the failure happened before an HTTP response
        // arrived (decode failure, broken pipe); worth retrying.
        StoreError::RemoteWrite { status, .. } => {
            status.map_or(ApiRetryClass::Retryable, classify_http_status)
        }
        StoreError::NotFound(_) | StoreError::Validation(_) | StoreError::Json(_) => {
            ApiRetryClass::Permanent
        }
    }
}

/// Exponential backoff in seconds with cap.
pub fn backoff_seconds(consecutive_failures: i32) -> u64 {
    const MAX_EXPONENT: i32 = 8;
    const BASE_DELAY_SECONDS: u64 = 5;

    let capped = consecutive_failures.clamp(0, MAX_EXPONENT) as u32;
    2_u64.pow(capped) * BASE_DELAY_SECONDS
}

/// Map a reqwest failure that happened before any HTTP status arrived.
pub fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_connect() || err.is_timeout() {
        StoreError::unavailable(err.to_string())
    } else {
        StoreError::write(err.to_string())
    }
}

/// Map a non-success HTTP status plus response body.
pub fn status_error(status: u16, body: &str) -> StoreError {
    const MAX_BODY_CHARS: usize = 512;

    if status == 404 {
        return StoreError::not_found(format!("remote returned 404: {body}"));
    }
    let mut preview: String = body.chars().take(MAX_BODY_CHARS).collect();
    if body.chars().count() > MAX_BODY_CHARS {
        preview.push_str("...");
    }
    StoreError::write_status(status, preview)
}
