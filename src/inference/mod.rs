//! Model Invocation
//!
//! A single [`InferenceClient`] trait with one implementation per provider
//! API. Every implementation classifies its failures into [`FailureKind`]
//! before returning.

pub mod client;
pub mod classify;
pub mod http;
pub mod provider;
pub mod anthropic;
pub mod openai;
pub mod gemini;

pub use client::{
    Failure, FailureKind, InferenceClient, InferenceOutcome, InferenceSuccess, ResponseScreen,
    ScreenConfig,
};
pub use provider::{build_client, ProviderKind, ProviderSettings, ProvidersConfig};
pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use gemini::GeminiClient;
