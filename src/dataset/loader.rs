//! CSV dataset loading and image discovery
//!
//! The dataset is a CSV export of the case list with one row per case. Images
//! live in a flat directory named `img_page<case>_<index>.<ext>`, with indices
//! counting up from 0.

use super::case::{Case, CaseId};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Dataset location and layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Case list CSV
    pub path: PathBuf,
    /// Column holding the case id
    pub id_column: String,
    /// Column holding the question text
    pub question_column: String,
    /// Directory with `img_page<case>_<index>.<ext>` files
    pub images_dir: PathBuf,
    /// Highest number of images attached to one case
    pub max_images_per_case: usize,
    /// Extensions tried for each image index, in order
    pub extensions: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("NEJM_list.csv"),
            id_column: "PPT No.".to_string(),
            question_column: "Q".to_string(),
            images_dir: PathBuf::from("pptimages"),
            max_images_per_case: 1,
            extensions: ["png", "jpg", "jpeg", "bmp", "tiff", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Ordered case list
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    cases: Vec<Case>,
}

impl Dataset {
    /// Load the CSV at `config.path` and attach each case's images.
    pub fn from_config(config: &DatasetConfig) -> crate::Result<Self> {
        let file = std::fs::File::open(&config.path).map_err(|e| {
            crate::Error::Dataset(format!("cannot open {}: {}", config.path.display(), e))
        })?;
        let dataset = Self::from_reader(file, config)?;
        info!(
            path = %config.path.display(),
            cases = dataset.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Parse CSV from any reader.
    pub fn from_reader<R: Read>(reader: R, config: &DatasetConfig) -> crate::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| crate::Error::Dataset(format!("missing column '{}'", name)))
        };
        let id_idx = column(&config.id_column)?;
        let question_idx = column(&config.question_column)?;

        let mut cases = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let id = CaseId::new(record.get(id_idx).unwrap_or_default());
            if id.is_empty() {
                warn!(row = row + 2, "Skipping row without case id");
                continue;
            }
            let question = record.get(question_idx).unwrap_or_default().trim().to_string();
            let image_paths = find_case_images(
                &config.images_dir,
                &id,
                config.max_images_per_case,
                &config.extensions,
            );
            cases.push(Case {
                id,
                question,
                image_paths,
            });
        }

        Ok(Self { cases })
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn into_cases(self) -> Vec<Case> {
        self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// `img_page<case>_<index>.<ext>` for the first matching extension
pub fn image_path(dir: &Path, case: &CaseId, index: usize, ext: &str) -> PathBuf {
    dir.join(format!("img_page{}_{}.{}", case, index, ext))
}

/// Images for `case`, stopping at the first index with no file.
pub fn find_case_images(
    dir: &Path,
    case: &CaseId,
    max_images: usize,
    extensions: &[String],
) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for index in 0..max_images {
        let hit = extensions
            .iter()
            .map(|ext| image_path(dir, case, index, ext))
            .find(|p| p.is_file());
        match hit {
            Some(path) => found.push(path),
            None => break,
        }
    }
    if found.is_empty() {
        debug!(case = %case, dir = %dir.display(), "No images found for case");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(images_dir: &Path) -> DatasetConfig {
        DatasetConfig {
            images_dir: images_dir.to_path_buf(),
            max_images_per_case: 3,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn test_from_reader_reads_cases_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let csv = "PPT No.,Q,Answer\n12,\"Fever and rash. 1) A 2) B\",2\n3,Cough,1\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), &config(dir.path())).unwrap();

        let ids: Vec<_> = dataset.cases().iter().map(|c| c.id.to_string()).collect();
        assert_eq!(ids, vec!["12", "3"]);
        assert_eq!(dataset.cases()[0].question, "Fever and rash. 1) A 2) B");
    }

    #[test]
    fn test_rows_without_id_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let csv = "PPT No.,Q\n,orphan question\n5,kept\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), &config(dir.path())).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.cases()[0].id, CaseId::new("5"));
    }

    #[test]
    fn test_missing_column_is_dataset_error() {
        let dir = tempfile::tempdir().unwrap();
        let csv = "Case,Question\n1,x\n";
        let result = Dataset::from_reader(csv.as_bytes(), &config(dir.path()));
        assert!(matches!(result, Err(crate::Error::Dataset(msg)) if msg.contains("PPT No.")));
    }

    #[test]
    fn test_find_case_images_stops_at_gap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("img_page4_0.png"), b"x").unwrap();
        std::fs::write(dir.path().join("img_page4_1.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("img_page4_3.png"), b"x").unwrap();

        let images = find_case_images(dir.path(), &CaseId::new("4"), 5, &DatasetConfig::default().extensions);
        assert_eq!(
            images,
            vec![dir.path().join("img_page4_0.png"), dir.path().join("img_page4_1.jpg")]
        );
    }

    #[test]
    fn test_find_case_images_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("img_page9_0.png"), b"x").unwrap();
        std::fs::write(dir.path().join("img_page9_1.png"), b"x").unwrap();

        let images = find_case_images(dir.path(), &CaseId::new("9"), 1, &DatasetConfig::default().extensions);
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_from_config_missing_file() {
        let dataset_config = DatasetConfig {
            path: PathBuf::from("/nonexistent/cases.csv"),
            ..DatasetConfig::default()
        };
        assert!(matches!(Dataset::from_config(&dataset_config), Err(crate::Error::Dataset(_))));
    }
}
