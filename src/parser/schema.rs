//! Answer schemas
//!
//! A schema lists the JSON keys the model is asked to produce and the column
//! each key lands in. The parser and the answer tables only ever see a
//! [`Schema`], never a hard-coded field list.

/// One expected field of a structured answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key in the model's JSON payload
    pub key: String,
    /// Column name in answer tables
    pub column: String,
}

impl FieldSpec {
    pub fn new(key: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            column: column.into(),
        }
    }
}

/// Ordered set of fields expected in a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// `answer` / `reason`, for multiple-choice questions
    pub fn answer_reason() -> Self {
        Self::new(
            "answer_reason",
            vec![FieldSpec::new("answer", "answer"), FieldSpec::new("reason", "reason")],
        )
    }

    /// Five imaging characteristics, keys numbered in prompt order
    pub fn imaging() -> Self {
        Self::new(
            "imaging",
            [
                "TypeOfMedicalImaging",
                "SpecificImagingSequence",
                "UseOfContrast",
                "ImagePlane",
                "PartOfTheBodyImaged",
            ]
            .iter()
            .enumerate()
            .map(|(i, column)| FieldSpec::new(format!("{}_{}", i + 1, column), *column))
            .collect(),
        )
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
