//! Failure Classification
//!
//! Maps HTTP status codes, error bodies and transport errors onto
//! [`FailureKind`]. All provider wording is matched here and nowhere else.

use super::client::{preview, Failure, FailureKind};

/// Phrases that mark a usage or billing limit
const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "exceeded",
    "resource_exhausted",
    "insufficient_quota",
    "billing",
    "credit balance",
];

/// Phrases that mark a safety or content-policy rejection
const SAFETY_MARKERS: &[&str] = &[
    "safety",
    "content_policy",
    "content policy",
    "content_filter",
    "content management policy",
    "blocked",
];

/// Phrases that mark an image the provider could not accept as sent
const IMAGE_MARKERS: &[&str] = &[
    "image_parse_error",
    "image exceeds",
    "image too large",
    "could not process image",
    "invalid image",
    "request_too_large",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify a non-success HTTP response.
pub fn classify_http(status: u16, body: &str) -> Failure {
    let lower = body.to_lowercase();
    let detail = format!("HTTP {}: {}", status, preview(body.trim(), 300));

    let kind = match status {
        429 if contains_any(&lower, QUOTA_MARKERS) => FailureKind::QuotaExceeded,
        429 => FailureKind::TransientProviderError,
        402 => FailureKind::QuotaExceeded,
        413 => FailureKind::TransientProviderError,
        500..=599 => FailureKind::TransientProviderError,
        _ if contains_any(&lower, SAFETY_MARKERS) => FailureKind::ContentRejected,
        _ if contains_any(&lower, IMAGE_MARKERS) => FailureKind::TransientProviderError,
        _ if lower.contains("insufficient_quota") => FailureKind::QuotaExceeded,
        _ => FailureKind::Unknown,
    };

    Failure::new(kind, detail)
}

/// Classify a request that never produced a response.
pub fn classify_transport(err: &reqwest::Error) -> Failure {
    let kind = if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        FailureKind::TransientProviderError
    } else {
        FailureKind::Unknown
    };
    Failure::new(kind, format!("request failed: {}", err))
}

/// Classify a provider finish/block reason reported inside a 200 response.
pub fn classify_finish_reason(reason: &str) -> Option<FailureKind> {
    match reason.to_ascii_uppercase().as_str() {
        "SAFETY" | "IMAGE_SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII"
        | "CONTENT_FILTER" | "REFUSAL" | "OTHER_BLOCK" => Some(FailureKind::ContentRejected),
        _ => None,
    }
}
