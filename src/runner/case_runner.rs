//! Case Runner
//!
//! One pass over the dataset for one [`InvocationConfig`]. Cases run strictly
//! in order, one at a time:
//!
//! 1. artifact present: re-parse it, no network call
//! 2. pause for the inter-case delay
//! 3. encode eligible images
//! 4. retry-wrapped invocation
//! 5. on success: write artifact, record timing, parse the answer
//!
//! Per-case failures are logged and the pass moves on. A quota abort flushes
//! timing and ends the pass immediately.

use super::key::InvocationConfig;
use super::task::Task;
use crate::dataset::{Case, CaseId};
use crate::encoding::{EncodedImage, ImageEncoder};
use crate::inference::InferenceClient;
use crate::parser::{ParsedAnswer, ResultParser};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::storage::{AnswerTable, ResultStore, TimingStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Pause before each case that needs a model call
    pub inter_case_delay_secs: f64,
    /// Root directory for artifacts and timing files
    pub results_dir: PathBuf,
    /// Append `run` logs to `<results_dir>/process_log.txt`
    pub process_log: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            inter_case_delay_secs: 15.0,
            results_dir: PathBuf::from("results"),
            process_log: true,
        }
    }
}

impl RunnerConfig {
    pub fn inter_case_delay(&self) -> Duration {
        Duration::from_secs_f64(self.inter_case_delay_secs.max(0.0))
    }

    /// Persistent log of every run, if enabled
    pub fn process_log_path(&self) -> Option<PathBuf> {
        self.process_log
            .then(|| self.results_dir.join("process_log.txt"))
    }
}

/// Why a case ended without a result
#[derive(Debug, Clone, PartialEq)]
pub enum CaseFailure {
    /// No image passed the minimum-dimension filter
    NoImages,
    /// An image could not be encoded under the ceiling
    Encoding(String),
    /// Retry budget ran out
    Exhausted { attempts: u32 },
    /// Unretryable failure
    Abandoned(String),
}

/// What happened during one pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub config: InvocationConfig,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Cases skipped because their artifact already existed
    pub skipped: usize,
    /// Cases that produced a new artifact
    pub completed: usize,
    /// Cases with no result this pass
    pub failed: Vec<(CaseId, CaseFailure)>,
    /// Model calls made, retries included
    pub invocations: u32,
    /// The provider ran out of quota; the run stops here
    pub aborted: bool,
    pub answers: AnswerTable,
}

impl PassReport {
    fn new(config: &InvocationConfig, answers: AnswerTable) -> Self {
        let now = Utc::now();
        Self {
            config: config.clone(),
            started_at: now,
            finished_at: now,
            skipped: 0,
            completed: 0,
            failed: Vec::new(),
            invocations: 0,
            aborted: false,
            answers,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Sequential per-case orchestrator
#[derive(Debug, Clone)]
pub struct CaseRunner {
    task: Task,
    encoder: ImageEncoder,
    policy: RetryPolicy,
    parser: ResultParser,
    store: ResultStore,
    delay: Duration,
}

impl CaseRunner {
    pub fn new(
        task: Task,
        encoder: ImageEncoder,
        policy: RetryPolicy,
        store: ResultStore,
        delay: Duration,
    ) -> Self {
        Self {
            task,
            encoder,
            policy,
            parser: ResultParser::new(),
            store,
            delay,
        }
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run every case under `config`, updating `timing` in place.
    ///
    /// Writes the answer table and flushes `timing` when the pass completes.
    /// On a quota abort only `timing` is flushed. `timing` is also flushed
    /// before any I/O error is returned, so artifacts written earlier in the
    /// pass keep their timing records.
    pub async fn run_pass(
        &self,
        client: &dyn InferenceClient,
        config: &InvocationConfig,
        cases: &[Case],
        timing: &mut TimingStore,
    ) -> crate::Result<PassReport> {
        let mut report = PassReport::new(config, AnswerTable::new(self.task.schema()));

        info!(config = %config, task = %self.task, cases = cases.len(), "Starting pass");

        let result = self.run_cases(client, config, cases, timing, &mut report).await;
        let result = match result {
            Ok(()) if report.aborted => Ok(()),
            Ok(()) => report.answers.write(&self.store.answers_path(config)),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!(config = %config, error = %e, "Pass failed, flushing timing");
            if let Err(flush_err) = timing.flush() {
                warn!(path = %timing.path().display(), error = %flush_err, "Timing flush failed");
            }
            return Err(e);
        }

        timing.flush()?;
        report.finished_at = Utc::now();

        if !report.aborted {
            info!(
                config = %config,
                completed = report.completed,
                skipped = report.skipped,
                failed = report.failed.len(),
                invocations = report.invocations,
                "Pass finished"
            );
        }
        Ok(report)
    }

    /// The per-case loop. Stops early, with `report.aborted` set, on quota.
    async fn run_cases(
        &self,
        client: &dyn InferenceClient,
        config: &InvocationConfig,
        cases: &[Case],
        timing: &mut TimingStore,
        report: &mut PassReport,
    ) -> crate::Result<()> {
        let schema = self.task.schema();

        for case in cases {
            let key = config.key(&case.id);

            if self.store.exists(&key) {
                debug!(key = %key, "Result exists, skipping");
                let answer = match self.store.read(&key) {
                    Ok(raw) => self.parser.parse(&raw, &schema),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Unreadable result artifact, blank answer");
                        ParsedAnswer::blank(&schema)
                    }
                };
                report.answers.push(case.id.clone(), answer);
                report.skipped += 1;
                continue;
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let images = match self.encode_case(case) {
                Ok(images) => images,
                Err(failure) => {
                    report.failed.push((case.id.clone(), failure));
                    continue;
                }
            };

            let prompt = self.task.prompt(case);
            let outcome = match self
                .policy
                .run(client, &self.encoder, &prompt, images, config.temperature)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(key = %key, error = %e, "Re-encoding failed, case has no result");
                    report
                        .failed
                        .push((case.id.clone(), CaseFailure::Encoding(e.to_string())));
                    continue;
                }
            };
            report.invocations += outcome.attempts();

            match outcome {
                RetryOutcome::Done { success, attempts } => {
                    self.store.write(&key, &success.raw_text)?;
                    timing.record(&case.id, config.temperature, config.trial, success.elapsed);
                    report
                        .answers
                        .push(case.id.clone(), self.parser.parse(&success.raw_text, &schema));
                    report.completed += 1;
                    info!(
                        key = %key,
                        attempts,
                        elapsed_ms = success.elapsed.as_millis() as u64,
                        "Result saved"
                    );
                }
                RetryOutcome::Exhausted { attempts, last_failure } => {
                    warn!(key = %key, attempts, last = %last_failure, "No result found");
                    report
                        .failed
                        .push((case.id.clone(), CaseFailure::Exhausted { attempts }));
                }
                RetryOutcome::Abandoned { failure, .. } => {
                    warn!(key = %key, failure = %failure, "No result found");
                    report
                        .failed
                        .push((case.id.clone(), CaseFailure::Abandoned(failure.to_string())));
                }
                RetryOutcome::Aborted { failure, .. } => {
                    warn!(key = %key, failure = %failure, "Provider quota exceeded, stopping run");
                    report.aborted = true;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Eligible images of `case`, encoded; empty for text-only tasks.
    fn encode_case(&self, case: &Case) -> Result<Vec<EncodedImage>, CaseFailure> {
        if !self.task.uses_images() {
            return Ok(Vec::new());
        }

        let mut images = Vec::with_capacity(case.image_paths.len());
        for path in &case.image_paths {
            match self.encoder.encode_path(path) {
                Ok(Some(image)) => images.push(image),
                Ok(None) => {}
                Err(e) => {
                    warn!(case = %case.id, path = %path.display(), error = %e, "Image encoding failed, case has no result");
                    return Err(CaseFailure::Encoding(e.to_string()));
                }
            }
        }

        if images.is_empty() {
            warn!(case = %case.id, "No eligible images, case has no result");
            return Err(CaseFailure::NoImages);
        }
        Ok(images)
    }
}
