//! Latency Telemetry
//!
//! One row per (case, temperature, trial). The table is loaded once when a
//! provider's experiment starts, updated in place as cases finish, and
//! flushed after every pass and on abort. Recording an existing key
//! overwrites its time.

use super::write_atomic;
use crate::dataset::CaseId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const HEADER: [&str; 4] = ["case", "temperature", "trial", "elapsed_time"];

/// Elapsed time of one successful call, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub case: CaseId,
    pub temperature: f64,
    pub trial: u32,
    pub elapsed_time: f64,
}

impl TimingRecord {
    fn matches(&self, case: &CaseId, temperature: f64, trial: u32) -> bool {
        self.case == *case && self.trial == trial && same_temperature(self.temperature, temperature)
    }
}

fn same_temperature(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Summary statistics over recorded times, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingStats {
    pub count: usize,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    /// Sample standard deviation; 0 with fewer than two records
    pub std_dev: f64,
}

/// Owned timing table backed by a CSV file
#[derive(Debug, Clone)]
pub struct TimingStore {
    path: PathBuf,
    records: Vec<TimingRecord>,
}

impl TimingStore {
    /// Empty store that will flush to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Load `path`, or start empty if it does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "No timing file yet, starting empty");
            return Ok(Self::new(path));
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut store = Self::new(path);
        for row in reader.deserialize::<TimingRecord>() {
            let record = row?;
            store.upsert(record);
        }
        debug!(path = %store.path.display(), records = store.len(), "Loaded timing records");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[TimingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or overwrite the time for (case, temperature, trial).
    pub fn record(&mut self, case: &CaseId, temperature: f64, trial: u32, elapsed: Duration) {
        self.upsert(TimingRecord {
            case: case.clone(),
            temperature,
            trial,
            elapsed_time: elapsed.as_secs_f64(),
        });
    }

    fn upsert(&mut self, record: TimingRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.matches(&record.case, record.temperature, record.trial))
        {
            Some(existing) => existing.elapsed_time = record.elapsed_time,
            None => self.records.push(record),
        }
    }

    pub fn get(&self, case: &CaseId, temperature: f64, trial: u32) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.matches(case, temperature, trial))
            .map(|r| r.elapsed_time)
    }

    /// Rewrite the backing file with the current records.
    pub fn flush(&self) -> crate::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(HEADER)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| crate::Error::Io(e.into_error()))?;

        write_atomic(&self.path, &bytes)?;
        info!(path = %self.path.display(), records = self.len(), "Timing records saved");
        Ok(())
    }

    /// Statistics over all records, or only those of one (temperature, trial).
    pub fn stats(&self, filter: Option<(f64, u32)>) -> Option<TimingStats> {
        let times: Vec<f64> = self
            .records
            .iter()
            .filter(|r| match filter {
                Some((t, trial)) => same_temperature(r.temperature, t) && r.trial == trial,
                None => true,
            })
            .map(|r| r.elapsed_time)
            .collect();

        if times.is_empty() {
            return None;
        }

        let count = times.len();
        let mean = times.iter().sum::<f64>() / count as f64;
        let max = times.iter().copied().fold(f64::MIN, f64::max);
        let min = times.iter().copied().fold(f64::MAX, f64::min);
        let std_dev = if count > 1 {
            let var = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        Some(TimingStats {
            count,
            mean,
            max,
            min,
            std_dev,
        })
    }
}
