//! # Vision Bench
//!
//! A resumable benchmark harness that evaluates vision-capable language-model
//! providers against a fixed set of clinical image + question cases.
//!
//! ## Overview
//!
//! Every case flows through the same inference pipeline regardless of the
//! provider: images are encoded under the provider's byte budget, the model is
//! invoked under a bounded retry policy that reacts to each failure class, the
//! free-form reply is parsed into a fixed-schema answer, and the raw reply plus
//! its latency are recorded so that a later run can pick up where this one
//! stopped.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vision_bench::app::config::Config;
//! use vision_bench::dataset::Dataset;
//! use vision_bench::inference::{build_client, ProviderKind};
//! use vision_bench::runner::{Experiment, Task};
//!
//! # async fn demo() -> vision_bench::Result<()> {
//! let config = Config::load_default()?;
//! let cases = Dataset::from_config(&config.dataset)?.into_cases();
//! let client = build_client(ProviderKind::Anthropic, &config)?;
//!
//! let experiment = Experiment::from_config(&config, ProviderKind::Anthropic, Task::ImageChallenge);
//! let report = experiment.run(client.as_ref(), &cases).await?;
//! println!("{} passes, aborted: {}", report.passes.len(), report.aborted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`encoding`]: image normalisation and size-bounded JPEG encoding
//! - [`inference`]: the provider-polymorphic client and failure classification
//! - [`retry`]: the failure-aware resize-and-retry state machine
//! - [`parser`]: schema-driven extraction of structured answers
//! - [`dataset`]: cases and their image files
//! - [`storage`]: result artifacts, timing records and answer tables
//! - [`runner`]: per-case orchestration and the temperature × trial matrix
//! - [`app`]: CLI and configuration management
//!
//! ## Case Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Artifact   │───▶│   Image     │───▶│   Retry     │───▶│  Inference  │
//! │  exists?    │    │   Encoder   │    │   Policy    │◀───│   Client    │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                              │
//!                                              ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Answer    │◀───│   Result    │◀───│  Artifact + │
//! │   Table     │    │   Parser    │    │   Timing    │
//! └─────────────┘    └─────────────┘    └─────────────┘
//! ```

pub mod encoding;
pub mod inference;
pub mod retry;
pub mod parser;
pub mod dataset;
pub mod storage;
pub mod runner;
pub mod app;

// Re-export commonly used types
pub use dataset::{Case, CaseId};
pub use encoding::{EncodedImage, ImageEncoder};
pub use inference::{Failure, FailureKind, InferenceClient, InferenceOutcome, InferenceSuccess};
pub use parser::{ParsedAnswer, ResultParser, Schema};
pub use retry::{RetryOutcome, RetryPolicy};
pub use runner::{CaseRunner, InvocationConfig, ResultKey};
pub use storage::TimingStore;

use std::path::PathBuf;

/// Result type alias for the benchmark harness
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the benchmark harness
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Image error: {0}")]
    Image(String),

    #[error("Image still {last_size} bytes after {attempts} resize attempts (ceiling {ceiling} bytes)")]
    SizeLimitExceeded {
        ceiling: usize,
        attempts: u32,
        last_size: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
