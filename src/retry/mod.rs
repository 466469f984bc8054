//! Bounded, failure-aware retry around an [`crate::InferenceClient`]

pub mod policy;

pub use policy::{RetryConfig, RetryOutcome, RetryPolicy, Step};
