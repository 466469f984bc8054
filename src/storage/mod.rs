//! Durable Run State
//!
//! Three kinds of files survive between runs:
//! - raw result artifacts, one per [`crate::ResultKey`]; their presence marks
//!   a case as done
//! - the per-provider timing table ([`TimingStore`])
//! - answer tables, written at the end of each pass and by `summarize`
//!
//! Everything is written through [`write_atomic`] so an interrupted write
//! never leaves a partial file behind.

pub mod answers;
pub mod artifacts;
pub mod timing;

pub use answers::{combine_summaries, summarize_configuration, AnswerTable};
pub use artifacts::ResultStore;
pub use timing::{TimingRecord, TimingStats, TimingStore};

use std::path::{Path, PathBuf};

/// `<path>.tmp`, the staging file for `path`
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to `<path>.tmp`, then rename over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = staging_path(path);
    std::fs::write(&tmp, contents)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Open `path` for appending, creating it and its parent directories.
pub fn open_append(path: &Path) -> crate::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_appends_suffix() {
        assert_eq!(
            staging_path(Path::new("/r/img_page12_0.png.txt")),
            PathBuf::from("/r/img_page12_0.png.txt.tmp")
        );
    }

    #[test]
    fn test_write_atomic_creates_parents_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("out.txt");
        write_atomic(&path, b"hello").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        assert!(!staging_path(&path).exists());

        write_atomic(&path, b"replaced").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "replaced");
    }

    #[test]
    fn test_open_append_keeps_earlier_lines() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("process_log.txt");
        writeln!(open_append(&path).unwrap(), "first run").unwrap();
        writeln!(open_append(&path).unwrap(), "second run").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first run\nsecond run\n");
    }
}
