//! Failure-Aware Retry
//!
//! Drives an [`InferenceClient`] until it succeeds or the attempt budget runs
//! out. Each failure class maps to one transition:
//!
//! | Failure                  | Transition                                 |
//! |--------------------------|--------------------------------------------|
//! | `TransientProviderError` | back off, re-encode at `transient_scale`   |
//! | `DegenerateResponse`     | re-encode at `degenerate_scale`            |
//! | `ContentRejected`        | re-encode at `rejection_scale`             |
//! | `QuotaExceeded`          | abort the whole run                        |
//! | `Unknown`                | blind retry while `blind_retries` remain   |
//!
//! Re-encoding shrinks the images sent on the previous attempt, so the scale
//! compounds across attempts. The encoder's own size-ceiling loop restarts
//! from its attempt 0 every time.

use crate::encoding::{EncodedImage, ImageEncoder};
use crate::inference::{Failure, FailureKind, InferenceClient, InferenceOutcome, InferenceSuccess};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total invocations allowed per case, including the first
    pub max_attempts: u32,
    /// Re-encode scale after a transient provider error
    pub transient_scale: f64,
    /// Re-encode scale after a degenerate reply
    pub degenerate_scale: f64,
    /// Re-encode scale after a content rejection
    pub rejection_scale: f64,
    /// Retries allowed for unclassified failures (0 = give up immediately)
    pub blind_retries: u32,
    /// First backoff after a transient error, doubled per attempt
    pub backoff_base_ms: u64,
    /// Backoff cap
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            transient_scale: 0.9,
            degenerate_scale: 0.9,
            rejection_scale: 0.7,
            blind_retries: 0,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
        }
    }
}

/// Terminal state of one retry run
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// The client returned a usable reply
    Done {
        success: InferenceSuccess,
        attempts: u32,
    },
    /// `max_attempts` calls were made without success
    Exhausted { attempts: u32, last_failure: Failure },
    /// A failure the policy does not retry (unknown, blind retries used up)
    Abandoned { attempts: u32, failure: Failure },
    /// The provider reported a quota condition; stop the run
    Aborted { attempts: u32, failure: Failure },
}

impl RetryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Done { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Abandoned { attempts, .. }
            | RetryOutcome::Aborted { attempts, .. } => *attempts,
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Shrink every image by `scale` and call again
    Reencode { scale: f64, backoff: Duration },
    /// Call again with the same images
    Repeat,
    /// Stop this case
    GiveUp,
    /// Stop the run
    Abort,
}

/// Bounded resize-and-retry state machine
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Transition for `kind` after the attempt with index `attempt` (0-based).
    ///
    /// `blind_used` counts blind retries already spent on this case.
    pub fn next_step(&self, kind: FailureKind, attempt: u32, blind_used: u32) -> Step {
        match kind {
            FailureKind::TransientProviderError => Step::Reencode {
                scale: self.config.transient_scale,
                backoff: self.backoff(attempt),
            },
            FailureKind::DegenerateResponse => Step::Reencode {
                scale: self.config.degenerate_scale,
                backoff: Duration::ZERO,
            },
            FailureKind::ContentRejected => Step::Reencode {
                scale: self.config.rejection_scale,
                backoff: Duration::ZERO,
            },
            FailureKind::QuotaExceeded => Step::Abort,
            FailureKind::Unknown if blind_used < self.config.blind_retries => Step::Repeat,
            FailureKind::Unknown => Step::GiveUp,
        }
    }

    /// Exponential backoff for transient errors: base * 2^attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        let ms = self
            .config
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.config.backoff_max_ms);
        Duration::from_millis(ms)
    }

    /// Run `client` until a terminal state.
    ///
    /// Returns `Err` only when re-encoding fails (e.g. the image cannot be
    /// brought under the size ceiling); every provider failure ends in a
    /// [`RetryOutcome`].
    pub async fn run(
        &self,
        client: &dyn InferenceClient,
        encoder: &ImageEncoder,
        prompt: &str,
        mut images: Vec<EncodedImage>,
        temperature: f64,
    ) -> crate::Result<RetryOutcome> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut blind_used = 0;
        let mut attempt = 0;

        loop {
            debug!(
                client = client.name(),
                attempt = attempt + 1,
                max_attempts,
                images = images.len(),
                "Invoking model"
            );

            let failure = match client.invoke(prompt, &images, temperature).await {
                InferenceOutcome::Success(success) => {
                    if attempt > 0 {
                        info!(client = client.name(), attempts = attempt + 1, "Succeeded after retry");
                    }
                    return Ok(RetryOutcome::Done {
                        success,
                        attempts: attempt + 1,
                    });
                }
                InferenceOutcome::Failure(failure) => failure,
            };

            let step = self.next_step(failure.kind, attempt, blind_used);

            match step {
                Step::Abort => {
                    warn!(client = client.name(), detail = %failure.detail, "Quota exceeded, aborting run");
                    return Ok(RetryOutcome::Aborted {
                        attempts: attempt + 1,
                        failure,
                    });
                }
                Step::GiveUp => {
                    warn!(
                        client = client.name(),
                        kind = %failure.kind,
                        detail = %failure.detail,
                        "Unretryable failure, giving up on case"
                    );
                    return Ok(RetryOutcome::Abandoned {
                        attempts: attempt + 1,
                        failure,
                    });
                }
                Step::Reencode { .. } | Step::Repeat => {}
            }

            if attempt + 1 >= max_attempts {
                warn!(
                    client = client.name(),
                    attempts = attempt + 1,
                    last_kind = %failure.kind,
                    "Retry budget exhausted"
                );
                return Ok(RetryOutcome::Exhausted {
                    attempts: attempt + 1,
                    last_failure: failure,
                });
            }

            match step {
                Step::Reencode { scale, backoff } => {
                    warn!(
                        client = client.name(),
                        attempt = attempt + 1,
                        kind = %failure.kind,
                        scale,
                        "Retrying with smaller images"
                    );
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    images = images
                        .iter()
                        .map(|image| encoder.reencode(image, scale))
                        .collect::<crate::Result<Vec<_>>>()?;
                }
                Step::Repeat => {
                    blind_used += 1;
                    warn!(
                        client = client.name(),
                        attempt = attempt + 1,
                        detail = %failure.detail,
                        "Unclassified failure, blind retry"
                    );
                }
                Step::GiveUp | Step::Abort => {}
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed list of outcomes, repeating the last one forever.
    struct Scripted {
        outcomes: Vec<InferenceOutcome>,
        calls: AtomicU32,
        widths: Mutex<Vec<u32>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<InferenceOutcome>) -> Self {
            Self {
                outcomes,
                calls: AtomicU32::new(0),
                widths: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceClient for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn invoke(&self, _prompt: &str, images: &[EncodedImage], _t: f64) -> InferenceOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            if let Some(first) = images.first() {
                self.widths.lock().unwrap().push(first.width);
            }
            self.outcomes[n.min(self.outcomes.len() - 1)].clone()
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            backoff_base_ms: 0,
            ..RetryConfig::default()
        })
    }

    fn test_image(encoder: &ImageEncoder) -> EncodedImage {
        let img = RgbImage::from_fn(400, 300, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        encoder.encode(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    fn ok(text: &str) -> InferenceOutcome {
        InferenceOutcome::success(text, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let client = Scripted::new(vec![ok(r#"{"answer":"1","reason":"r"}"#)]);
        let encoder = ImageEncoder::new();
        let outcome = policy()
            .run(&client, &encoder, "q", vec![test_image(&encoder)], 1.0)
            .await
            .unwrap();

        assert!(matches!(outcome, RetryOutcome::Done { attempts: 1, .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_always_rejected_stops_at_max_attempts() {
        let client = Scripted::new(vec![InferenceOutcome::failure(
            FailureKind::ContentRejected,
            "blocked",
        )]);
        let encoder = ImageEncoder::new();
        let outcome = policy()
            .run(&client, &encoder, "q", vec![test_image(&encoder)], 1.0)
            .await
            .unwrap();

        match outcome {
            RetryOutcome::Exhausted { attempts, last_failure } => {
                assert_eq!(attempts, 10);
                assert_eq!(last_failure.kind, FailureKind::ContentRejected);
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
        assert_eq!(client.calls(), 10);
    }

    #[tokio::test]
    async fn test_rejection_shrinks_images_by_rejection_scale() {
        let client = Scripted::new(vec![
            InferenceOutcome::failure(FailureKind::ContentRejected, "SAFETY"),
            ok("a long enough reply"),
        ]);
        let encoder = ImageEncoder::new();
        let outcome = policy()
            .run(&client, &encoder, "q", vec![test_image(&encoder)], 1.0)
            .await
            .unwrap();

        assert!(matches!(outcome, RetryOutcome::Done { attempts: 2, .. }));
        assert_eq!(*client.widths.lock().unwrap(), vec![400, 280]);
    }

    #[tokio::test]
    async fn test_degenerate_then_success_uses_degenerate_scale() {
        let client = Scripted::new(vec![
            InferenceOutcome::failure(FailureKind::DegenerateResponse, "2 chars"),
            InferenceOutcome::failure(FailureKind::DegenerateResponse, "0 chars"),
            ok("a long enough reply"),
        ]);
        let encoder = ImageEncoder::new();
        let outcome = policy()
            .run(&client, &encoder, "q", vec![test_image(&encoder)], 1.0)
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 3);
        // 400 -> 360 -> 324
        assert_eq!(*client.widths.lock().unwrap(), vec![400, 360, 324]);
    }

    #[tokio::test]
    async fn test_quota_aborts_immediately() {
        let client = Scripted::new(vec![InferenceOutcome::failure(
            FailureKind::QuotaExceeded,
            "monthly limit exceeded",
        )]);
        let encoder = ImageEncoder::new();
        let outcome = policy().run(&client, &encoder, "q", vec![], 1.0).await.unwrap();

        assert!(matches!(outcome, RetryOutcome::Aborted { attempts: 1, .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_is_abandoned_without_blind_retries() {
        let client = Scripted::new(vec![InferenceOutcome::failure(FailureKind::Unknown, "???")]);
        let encoder = ImageEncoder::new();
        let outcome = policy().run(&client, &encoder, "q", vec![], 1.0).await.unwrap();

        assert!(matches!(outcome, RetryOutcome::Abandoned { attempts: 1, .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_blind_retries_keep_images_unchanged() {
        let client = Scripted::new(vec![
            InferenceOutcome::failure(FailureKind::Unknown, "???"),
            InferenceOutcome::failure(FailureKind::Unknown, "???"),
            InferenceOutcome::failure(FailureKind::Unknown, "???"),
        ]);
        let encoder = ImageEncoder::new();
        let policy = RetryPolicy::new(RetryConfig {
            blind_retries: 2,
            backoff_base_ms: 0,
            ..RetryConfig::default()
        });
        let outcome = policy
            .run(&client, &encoder, "q", vec![test_image(&encoder)], 1.0)
            .await
            .unwrap();

        assert!(matches!(outcome, RetryOutcome::Abandoned { attempts: 3, .. }));
        assert_eq!(*client.widths.lock().unwrap(), vec![400, 400, 400]);
    }

    #[tokio::test]
    async fn test_text_only_retry_has_no_images() {
        let client = Scripted::new(vec![
            InferenceOutcome::failure(FailureKind::TransientProviderError, "503"),
            ok("a long enough reply"),
        ]);
        let encoder = ImageEncoder::new();
        let outcome = policy().run(&client, &encoder, "q", vec![], 0.0).await.unwrap();
        assert!(matches!(outcome, RetryOutcome::Done { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_reencode_failure_is_returned_as_error() {
        let client = Scripted::new(vec![InferenceOutcome::failure(
            FailureKind::DegenerateResponse,
            "ok",
        )]);
        let undecodable = EncodedImage {
            bytes: vec![0x00, 0x01, 0x02, 0x03],
            format: crate::encoding::ImageFormat::Jpeg,
            width: 400,
            height: 300,
        };
        let result = policy()
            .run(&client, &ImageEncoder::new(), "q", vec![undecodable], 1.0)
            .await;

        assert!(matches!(result, Err(crate::Error::Image(_))));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_next_step_table() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next_step(FailureKind::ContentRejected, 0, 0),
            Step::Reencode { scale: 0.7, backoff: Duration::ZERO }
        );
        assert_eq!(
            policy.next_step(FailureKind::DegenerateResponse, 3, 0),
            Step::Reencode { scale: 0.9, backoff: Duration::ZERO }
        );
        assert_eq!(policy.next_step(FailureKind::QuotaExceeded, 0, 0), Step::Abort);
        assert_eq!(policy.next_step(FailureKind::Unknown, 0, 0), Step::GiveUp);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
        assert_eq!(policy.backoff(60), Duration::from_secs(30));
    }
}
