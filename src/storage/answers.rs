//! Answer tables and results integration

use super::artifacts::ResultStore;
use super::write_atomic;
use crate::dataset::{Case, CaseId};
use crate::parser::{ParsedAnswer, ResultParser, Schema};
use crate::runner::InvocationConfig;
use std::path::Path;
use tracing::{info, warn};

/// Parsed answers of one configuration, one row per case
#[derive(Debug, Clone)]
pub struct AnswerTable {
    schema: Schema,
    rows: Vec<(CaseId, ParsedAnswer)>,
}

impl AnswerTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn push(&mut self, case: CaseId, answer: ParsedAnswer) {
        self.rows.push((case, answer));
    }

    pub fn rows(&self) -> &[(CaseId, ParsedAnswer)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, case: &CaseId) -> Option<&ParsedAnswer> {
        self.rows.iter().find(|(c, _)| c == case).map(|(_, a)| a)
    }

    /// `case_number` followed by the schema columns
    pub fn to_csv(&self) -> crate::Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec!["case_number"];
        header.extend(self.schema.columns());
        writer.write_record(&header)?;

        for (case, answer) in &self.rows {
            let mut record = vec![case.as_str()];
            record.extend(answer.values());
            writer.write_record(&record)?;
        }
        writer
            .into_inner()
            .map_err(|e| crate::Error::Io(e.into_error()))
    }

    pub fn write(&self, path: &Path) -> crate::Result<()> {
        write_atomic(path, &self.to_csv()?)?;
        info!(path = %path.display(), rows = self.len(), "Answer table saved");
        Ok(())
    }
}

/// Re-parse every case's artifact under `config` into `sum.csv`.
///
/// Cases without a readable artifact get a blank row so the table lines up
/// with the dataset.
pub fn summarize_configuration(
    store: &ResultStore,
    config: &InvocationConfig,
    cases: &[Case],
    schema: &Schema,
) -> crate::Result<AnswerTable> {
    let parser = ResultParser::new();
    let mut table = AnswerTable::new(schema.clone());
    let mut missing = 0;
    let mut unreadable = 0;

    for case in cases {
        let key = config.key(&case.id);
        let answer = match store.read(&key) {
            Ok(raw) => parser.parse(&raw, schema),
            Err(crate::Error::ArtifactNotFound(path)) => {
                warn!(case = %case.id, path = %path.display(), "No result artifact, blank row");
                missing += 1;
                ParsedAnswer::blank(schema)
            }
            Err(e) => {
                warn!(case = %case.id, error = %e, "Unreadable result artifact, blank row");
                unreadable += 1;
                ParsedAnswer::blank(schema)
            }
        };
        table.push(case.id.clone(), answer);
    }

    let path = store.summary_path(config);
    table.write(&path)?;
    info!(config = %config, cases = cases.len(), missing, unreadable, "Configuration summarized");
    Ok(table)
}

/// Concatenate several configuration tables with a leading `configuration` column.
pub fn combine_summaries(tables: &[(InvocationConfig, AnswerTable)], path: &Path) -> crate::Result<()> {
    let Some((_, first)) = tables.first() else {
        return Err(crate::Error::Config("no summaries to combine".to_string()));
    };
    let schema = first.schema();
    if let Some((config, _)) = tables.iter().find(|(_, t)| t.schema() != schema) {
        return Err(crate::Error::Config(format!(
            "summary for {} uses a different schema than {}",
            config, schema.name
        )));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["configuration", "case_number"];
    header.extend(schema.columns());
    writer.write_record(&header)?;

    for (config, table) in tables {
        let name = config.dir_name();
        for (case, answer) in table.rows() {
            let mut record = vec![name.as_str(), case.as_str()];
            record.extend(answer.values());
            writer.write_record(&record)?;
        }
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| crate::Error::Io(e.into_error()))?;

    write_atomic(path, &bytes)?;
    info!(path = %path.display(), configurations = tables.len(), "Combined summary saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cases(ids: &[&str]) -> Vec<Case> {
        ids.iter().map(|id| Case::new(*id, "q", Vec::new())).collect()
    }

    #[test]
    fn test_to_csv_layout() {
        let schema = Schema::answer_reason();
        let mut table = AnswerTable::new(schema.clone());
        let answer = ResultParser::new().parse(r#"{"answer":"2","reason":"lesion, pattern"}"#, &schema);
        table.push(CaseId::new("12"), answer);

        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "case_number,answer,reason\n12,2,\"lesion, pattern\"\n");
    }

    #[test]
    fn test_summarize_writes_blank_rows_for_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let config = InvocationConfig::new("claude", 1.0, 1);
        store
            .write(&config.key(&CaseId::new("1")), r#"ok {"answer":"3","reason":"x"}"#)
            .unwrap();

        let table =
            summarize_configuration(&store, &config, &cases(&["1", "2"]), &Schema::answer_reason()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&CaseId::new("1")).unwrap().get("answer"), Some("3"));
        assert!(table.get(&CaseId::new("2")).unwrap().is_empty());

        let written = std::fs::read_to_string(store.summary_path(&config)).unwrap();
        assert_eq!(written, "case_number,answer,reason\n1,3,x\n2,,\n");
    }

    #[test]
    fn test_summarize_survives_unreadable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let config = InvocationConfig::new("claude", 1.0, 1);

        let garbled = store.artifact_path(&config.key(&CaseId::new("1")));
        std::fs::create_dir_all(garbled.parent().unwrap()).unwrap();
        let mut bytes = vec![0xff, 0xfe];
        bytes.extend_from_slice(br#" {"answer":"4","reason":"y"}"#);
        std::fs::write(&garbled, bytes).unwrap();

        // A directory where the artifact file should be
        std::fs::create_dir_all(store.artifact_path(&config.key(&CaseId::new("2")))).unwrap();

        let table =
            summarize_configuration(&store, &config, &cases(&["1", "2"]), &Schema::answer_reason()).unwrap();

        assert_eq!(table.get(&CaseId::new("1")).unwrap().get("answer"), Some("4"));
        assert!(table.get(&CaseId::new("2")).unwrap().is_empty());
        assert!(store.summary_path(&config).exists());
    }

    #[test]
    fn test_combine_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::answer_reason();
        let parser = ResultParser::new();

        let mut a = AnswerTable::new(schema.clone());
        a.push(CaseId::new("1"), parser.parse(r#"{"answer":"1","reason":"a"}"#, &schema));
        let mut b = AnswerTable::new(schema.clone());
        b.push(CaseId::new("1"), parser.parse(r#"{"answer":"4","reason":"b"}"#, &schema));

        let path = dir.path().join("combined.csv");
        combine_summaries(
            &[
                (InvocationConfig::new("claude", 1.0, 1), a),
                (InvocationConfig::new("claude", 1.0, 2), b),
            ],
            &path,
        )
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "configuration,case_number,answer,reason\n\
             claude_result_temp_1_0_try1,1,1,a\n\
             claude_result_temp_1_0_try2,1,4,b\n"
        );
    }

    #[test]
    fn test_combine_rejects_mixed_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let tables = vec![
            (InvocationConfig::new("claude", 1.0, 1), AnswerTable::new(Schema::answer_reason())),
            (InvocationConfig::new("claude", 1.0, 2), AnswerTable::new(Schema::imaging())),
        ];
        assert!(combine_summaries(&tables, &dir.path().join("c.csv")).is_err());
    }
}
