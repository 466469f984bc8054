//! Structured answer extraction
//!
//! Models wrap their JSON in prose ("Sure! Here is my answer: {...} Let me
//! know..."). The payload is taken to be everything from the first `{` to the
//! last `}`. Anything that fails to decode yields a blank answer and a log
//! line; it never stops the run.

use super::schema::Schema;
use serde_json::Value;
use tracing::warn;

/// Field values of one reply, in schema order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnswer {
    values: Vec<(String, String)>,
}

impl ParsedAnswer {
    /// All schema columns present, every value empty
    pub fn blank(schema: &Schema) -> Self {
        Self {
            values: schema.columns().map(|c| (c.to_string(), String::new())).collect(),
        }
    }

    /// Value for `column`, if the schema has it
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Values in schema order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(_, v)| v.as_str())
    }

    /// True when every field is blank
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|(_, v)| v.is_empty())
    }
}

/// Schema-parametric reply parser
#[derive(Debug, Clone, Default)]
pub struct ResultParser;

impl ResultParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse `raw` against `schema`, returning a blank answer on failure.
    pub fn parse(&self, raw: &str, schema: &Schema) -> ParsedAnswer {
        match self.try_parse(raw, schema) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(schema = %schema.name, error = %e, "Failed to parse structured answer");
                ParsedAnswer::blank(schema)
            }
        }
    }

    /// Parse `raw` against `schema`, reporting why it failed.
    pub fn try_parse(&self, raw: &str, schema: &Schema) -> crate::Result<ParsedAnswer> {
        let payload = extract_payload(raw)
            .ok_or_else(|| crate::Error::Parse("no brace-delimited payload in reply".to_string()))?;

        let value: Value = serde_json::from_str(payload)
            .map_err(|e| crate::Error::Parse(format!("payload is not valid JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| crate::Error::Parse("payload is not a JSON object".to_string()))?;

        let values = schema
            .fields
            .iter()
            .map(|field| {
                let text = object
                    .get(&field.key)
                    .or_else(|| object.get(&field.column))
                    .map(value_to_string)
                    .unwrap_or_default();
                (field.column.clone(), text)
            })
            .collect();

        Ok(ParsedAnswer { values })
    }
}

/// Substring from the first `{` to the last `}` inclusive
pub fn extract_payload(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

// Multi-valued fields stay opaque strings ("a.MR b.CT"); numbers and
// booleans keep their JSON spelling.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_inside_prose() {
        let raw = r#"preamble {"answer":"3","reason":"x"} postamble"#;
        let answer = ResultParser::new().parse(raw, &Schema::answer_reason());
        assert_eq!(answer.get("answer"), Some("3"));
        assert_eq!(answer.get("reason"), Some("x"));
        assert!(!answer.is_empty());
    }

    #[test]
    fn test_no_braces_yields_blank_answer() {
        let answer = ResultParser::new().parse("The answer is 3.", &Schema::answer_reason());
        assert!(answer.is_empty());
        assert_eq!(answer.get("answer"), Some(""));
        assert_eq!(answer.values().count(), 2);
    }

    #[test]
    fn test_invalid_json_yields_blank_answer() {
        let answer = ResultParser::new().parse("{answer: 3, reason: }", &Schema::answer_reason());
        assert!(answer.is_empty());
    }

    #[test]
    fn test_closing_before_opening_brace() {
        assert_eq!(extract_payload("} then {"), None);
        let result = ResultParser::new().try_parse("} then {", &Schema::answer_reason());
        assert!(matches!(result, Err(crate::Error::Parse(_))));
    }

    #[test]
    fn test_missing_field_is_blank() {
        let answer = ResultParser::new().parse(r#"{"answer": "2"}"#, &Schema::answer_reason());
        assert_eq!(answer.get("answer"), Some("2"));
        assert_eq!(answer.get("reason"), Some(""));
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        let answer = ResultParser::new().parse(r#"{"answer": 4, "reason": null}"#, &Schema::answer_reason());
        assert_eq!(answer.get("answer"), Some("4"));
        assert_eq!(answer.get("reason"), Some(""));
    }

    #[test]
    fn test_imaging_schema_keeps_lettered_lists() {
        let raw = r#"Here you go:
        {
            "1_TypeOfMedicalImaging": "a.MR b.CT",
            "2_SpecificImagingSequence": "a.T2WI b.postcontrast",
            "3_UseOfContrast": "a.No b.Yes",
            "4_ImagePlane": "axial",
            "5_PartOfTheBodyImaged": "head"
        }"#;
        let answer = ResultParser::new().parse(raw, &Schema::imaging());
        assert_eq!(answer.get("TypeOfMedicalImaging"), Some("a.MR b.CT"));
        assert_eq!(answer.get("ImagePlane"), Some("axial"));
        assert_eq!(
            answer.values().collect::<Vec<_>>(),
            vec!["a.MR b.CT", "a.T2WI b.postcontrast", "a.No b.Yes", "axial", "head"]
        );
    }

    #[test]
    fn test_column_name_accepted_as_key() {
        let raw = r#"{"TypeOfMedicalImaging": "CT"}"#;
        let answer = ResultParser::new().parse(raw, &Schema::imaging());
        assert_eq!(answer.get("TypeOfMedicalImaging"), Some("CT"));
    }
}
