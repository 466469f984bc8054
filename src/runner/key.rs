//! Experimental configurations and result keys

use crate::dataset::CaseId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One (provider, temperature, trial) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationConfig {
    /// Provider label, e.g. `claude`
    pub provider: String,
    pub temperature: f64,
    /// 1-based trial index
    pub trial: u32,
}

impl InvocationConfig {
    pub fn new(provider: impl Into<String>, temperature: f64, trial: u32) -> Self {
        Self {
            provider: provider.into(),
            temperature,
            trial,
        }
    }

    /// Temperature with `.` replaced by `_` (`1.0` -> `1_0`, `0.7` -> `0_7`)
    pub fn temperature_tag(&self) -> String {
        format!("{:?}", self.temperature).replace('.', "_")
    }

    /// Directory name for this configuration's artifacts
    pub fn dir_name(&self) -> String {
        format!(
            "{}_result_temp_{}_try{}",
            self.provider,
            self.temperature_tag(),
            self.trial
        )
    }

    /// Key for `case` under this configuration
    pub fn key(&self, case: &CaseId) -> ResultKey {
        ResultKey {
            config: self.clone(),
            case: case.clone(),
        }
    }
}

impl fmt::Display for InvocationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} T={} try{}", self.provider, self.temperature, self.trial)
    }
}

/// (provider, temperature, trial, case): one unit of resumable work
#[derive(Debug, Clone, PartialEq)]
pub struct ResultKey {
    pub config: InvocationConfig,
    pub case: CaseId,
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} case {}", self.config, self.case)
    }
}
