//! Inference Client Contract
//!
//! One `invoke` = one network call. Provider-specific failures are classified
//! into [`FailureKind`] here so the retry policy never sees provider wording.

use crate::encoding::EncodedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Closed set of invocation failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Network or server fault
    TransientProviderError,
    /// Safety filter refused the request or the reply opened with a refusal
    ContentRejected,
    /// Reply was implausibly short
    DegenerateResponse,
    /// Usage limit reached; ends the whole run
    QuotaExceeded,
    /// Anything not recognised above
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientProviderError => "transient_provider_error",
            FailureKind::ContentRejected => "content_rejected",
            FailureKind::DegenerateResponse => "degenerate_response",
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified invocation failure
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Raw model text plus the wall-clock time of the call
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSuccess {
    pub raw_text: String,
    pub elapsed: Duration,
}

/// Result of a single invocation
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutcome {
    Success(InferenceSuccess),
    Failure(Failure),
}

impl InferenceOutcome {
    pub fn success(raw_text: impl Into<String>, elapsed: Duration) -> Self {
        InferenceOutcome::Success(InferenceSuccess {
            raw_text: raw_text.into(),
            elapsed,
        })
    }

    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        InferenceOutcome::Failure(Failure::new(kind, detail))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InferenceOutcome::Success(_))
    }
}

impl From<Failure> for InferenceOutcome {
    fn from(failure: Failure) -> Self {
        InferenceOutcome::Failure(failure)
    }
}

/// A vision-capable model behind some provider API
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Perform exactly one model call.
    async fn invoke(
        &self,
        prompt: &str,
        images: &[EncodedImage],
        temperature: f64,
    ) -> InferenceOutcome;
}

/// Application-level checks applied to otherwise successful replies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Replies with fewer characters are degenerate
    pub min_response_chars: usize,
    /// Replies starting with any of these are refusals
    pub refusal_prefixes: Vec<String>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            min_response_chars: 10,
            refusal_prefixes: vec![
                "I'm sorry, but".to_string(),
                "I\u{2019}m sorry, but".to_string(),
                "I'm sorry, I can't".to_string(),
                "I cannot assist".to_string(),
            ],
        }
    }
}

/// Turns reply text into an outcome, flagging degenerate and refused replies
#[derive(Debug, Clone, Default)]
pub struct ResponseScreen {
    pub config: ScreenConfig,
}

impl ResponseScreen {
    pub fn new(config: ScreenConfig) -> Self {
        Self { config }
    }

    pub fn check(&self, text: String, elapsed: Duration) -> InferenceOutcome {
        let trimmed = text.trim_start();

        if let Some(prefix) = self
            .config
            .refusal_prefixes
            .iter()
            .find(|p| !p.is_empty() && trimmed.starts_with(p.as_str()))
        {
            debug!(prefix = %prefix, "Reply opens with refusal phrase");
            return InferenceOutcome::failure(
                FailureKind::ContentRejected,
                format!("reply opens with refusal: {}", preview(trimmed, 80)),
            );
        }

        let chars = trimmed.trim_end().chars().count();
        if chars < self.config.min_response_chars {
            return InferenceOutcome::failure(
                FailureKind::DegenerateResponse,
                format!("reply has {} chars: {:?}", chars, trimmed),
            );
        }

        InferenceOutcome::success(text, elapsed)
    }
}

/// First `max_chars` characters, with an ellipsis if cut
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
