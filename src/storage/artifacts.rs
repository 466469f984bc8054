//! Raw result artifacts
//!
//! Layout under the results root:
//!
//! ```text
//! <root>/<provider>_result/<provider>_result_temp_<T>_try<n>/
//!     img_page<case>_0.png.txt     raw model reply
//!     <provider>_results.csv       answers from the last pass
//!     sum.csv                      answers re-parsed by `summarize`
//! ```

use super::write_atomic;
use crate::runner::{InvocationConfig, ResultKey};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Filesystem store for per-key reply text
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every artifact of `config`
    pub fn config_dir(&self, config: &InvocationConfig) -> PathBuf {
        self.root
            .join(format!("{}_result", config.provider))
            .join(config.dir_name())
    }

    pub fn artifact_path(&self, key: &ResultKey) -> PathBuf {
        self.config_dir(&key.config)
            .join(format!("img_page{}_0.png.txt", key.case))
    }

    /// Answer table written at the end of a pass
    pub fn answers_path(&self, config: &InvocationConfig) -> PathBuf {
        self.config_dir(config)
            .join(format!("{}_results.csv", config.provider))
    }

    /// Answer table written by `summarize`
    pub fn summary_path(&self, config: &InvocationConfig) -> PathBuf {
        self.config_dir(config).join("sum.csv")
    }

    /// Per-provider timing table
    pub fn timing_path(&self, provider: &str) -> PathBuf {
        self.root.join(format!("{}_execution_times.csv", provider))
    }

    /// Whether `key` already has a result
    pub fn exists(&self, key: &ResultKey) -> bool {
        self.artifact_path(key).is_file()
    }

    /// Stored reply text for `key`.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD rather than failing the read.
    pub fn read(&self, key: &ResultKey) -> crate::Result<String> {
        let path = self.artifact_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(crate::Error::ArtifactNotFound(path));
            }
            Err(e) => return Err(e.into()),
        };
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(key = %key, path = %path.display(), "Artifact is not valid UTF-8, reading lossily");
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }

    /// Persist the reply text for `key`.
    pub fn write(&self, key: &ResultKey, raw_text: &str) -> crate::Result<PathBuf> {
        let path = self.artifact_path(key);
        write_atomic(&path, raw_text.as_bytes())?;
        debug!(key = %key, path = %path.display(), "Result artifact written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CaseId;

    #[test]
    fn test_artifact_layout() {
        let store = ResultStore::new("/results");
        let key = InvocationConfig::new("claude", 1.0, 1).key(&CaseId::new("12"));
        assert_eq!(
            store.artifact_path(&key),
            PathBuf::from("/results/claude_result/claude_result_temp_1_0_try1/img_page12_0.png.txt")
        );
        assert_eq!(
            store.answers_path(&key.config),
            PathBuf::from("/results/claude_result/claude_result_temp_1_0_try1/claude_results.csv")
        );
        assert_eq!(store.timing_path("claude"), PathBuf::from("/results/claude_execution_times.csv"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let key = InvocationConfig::new("gpt4o", 0.5, 2).key(&CaseId::new("3"));

        assert!(!store.exists(&key));
        store.write(&key, "reply text").unwrap();
        assert!(store.exists(&key));
        assert_eq!(store.read(&key).unwrap(), "reply text");
    }

    #[test]
    fn test_read_missing_is_artifact_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let key = InvocationConfig::new("gpt4o", 1.0, 1).key(&CaseId::new("99"));

        match store.read(&key) {
            Err(crate::Error::ArtifactNotFound(path)) => assert_eq!(path, store.artifact_path(&key)),
            other => panic!("Expected ArtifactNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_read_invalid_utf8_is_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let key = InvocationConfig::new("claude", 1.0, 1).key(&CaseId::new("1"));
        let path = store.artifact_path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, [0xff, 0xfe, b'{', b'}']).unwrap();

        assert_eq!(store.read(&key).unwrap(), "\u{fffd}\u{fffd}{}");
    }
}
