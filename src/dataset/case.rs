//! Benchmark cases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stable case key, as it appears in the dataset (`12`, `A3`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Trim the raw cell and drop a spreadsheet-style `.0` suffix, so
    /// `"12.0"` and `"12"` name the same case.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let normalized = match trimmed.strip_suffix(".0") {
            Some(int) if !int.is_empty() && int.chars().all(|c| c.is_ascii_digit()) => int,
            _ => trimmed,
        };
        Self(normalized.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseId {
    fn from(raw: &str) -> Self {
        CaseId::new(raw)
    }
}

impl From<u32> for CaseId {
    fn from(n: u32) -> Self {
        CaseId(n.to_string())
    }
}

/// One benchmark item; immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub id: CaseId,
    /// Question or symptom text
    pub question: String,
    /// Source images in index order
    pub image_paths: Vec<PathBuf>,
}

impl Case {
    pub fn new(id: impl Into<CaseId>, question: impl Into<String>, image_paths: Vec<PathBuf>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            image_paths,
        }
    }
}
