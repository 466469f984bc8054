//! Single-shot HTTP dispatch for provider calls.
//!
//! Sends one request, reads the full body and times the round trip.
//! Non-success statuses and transport errors come back as classified
//! [`Failure`]s; retrying is the retry policy's job, not this module's.

use super::classify::{classify_http, classify_transport};
use super::client::{Failure, FailureKind};
use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Successful response body and elapsed wall-clock time
#[derive(Debug)]
pub struct TimedBody {
    pub body: String,
    pub elapsed: Duration,
}

/// Send an HTTP request exactly once.
///
/// Failure mapping:
/// - 429 with quota wording: `QuotaExceeded`; other 429: transient
/// - 5xx, 413, timeout/connect error: transient
/// - safety wording in a 4xx body: `ContentRejected`
/// - anything else: `Unknown`
pub async fn send_once<F>(client: &Client, build_request: F, context: &str) -> Result<TimedBody, Failure>
where
    F: FnOnce(&Client) -> RequestBuilder,
{
    let start = Instant::now();

    let response = match build_request(client).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let failure = classify_transport(&e);
            warn!("{}: request failed ({}): {}", context, failure.kind, e);
            return Err(failure);
        }
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            warn!("{}: failed reading response body: {}", context, e);
            return Err(Failure::new(
                FailureKind::TransientProviderError,
                format!("failed reading body: {}", e),
            ));
        }
    };
    let elapsed = start.elapsed();

    if status.is_success() {
        debug!("{}: {} in {:?} ({} bytes)", context, status, elapsed, body.len());
        Ok(TimedBody { body, elapsed })
    } else {
        let failure = classify_http(status.as_u16(), &body);
        warn!("{}: {} classified as {}", context, status, failure.kind);
        Err(failure)
    }
}
