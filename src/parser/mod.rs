//! Structured answers from free-form model text

pub mod answer;
pub mod schema;

pub use answer::{extract_payload, ParsedAnswer, ResultParser};
pub use schema::{FieldSpec, Schema};
