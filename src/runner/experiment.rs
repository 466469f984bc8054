//! Temperature × trial matrix for one provider

use super::case_runner::{CaseRunner, PassReport};
use super::key::InvocationConfig;
use super::task::Task;
use crate::app::config::Config;
use crate::dataset::Case;
use crate::encoding::ImageEncoder;
use crate::inference::{InferenceClient, ProviderKind};
use crate::retry::RetryPolicy;
use crate::storage::{ResultStore, TimingStore};
use tracing::{info, warn};

/// Passes run for one provider
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub passes: Vec<PassReport>,
    /// A pass hit the provider's quota and the remaining passes were skipped
    pub aborted: bool,
}

/// Every (temperature, trial) configuration for one provider and task
#[derive(Debug, Clone)]
pub struct Experiment {
    provider_label: String,
    temperatures: Vec<f64>,
    trials: u32,
    runner: CaseRunner,
}

impl Experiment {
    pub fn new(provider_label: impl Into<String>, temperatures: Vec<f64>, trials: u32, runner: CaseRunner) -> Self {
        Self {
            provider_label: provider_label.into(),
            temperatures,
            trials,
            runner,
        }
    }

    pub fn from_config(config: &Config, provider: ProviderKind, task: Task) -> Self {
        let runner = CaseRunner::new(
            task,
            ImageEncoder::with_config(config.encoder.clone()),
            RetryPolicy::new(config.retry.clone()),
            ResultStore::new(&config.runner.results_dir),
            config.runner.inter_case_delay(),
        );
        Self::new(
            provider.settings(&config.providers).label.clone(),
            config.experiment.temperatures.clone(),
            config.experiment.trials,
            runner,
        )
    }

    /// Configurations in run order: temperatures outer, trials inner
    pub fn configurations(&self) -> Vec<InvocationConfig> {
        self.temperatures
            .iter()
            .flat_map(|&t| (1..=self.trials).map(move |trial| (t, trial)))
            .map(|(t, trial)| InvocationConfig::new(self.provider_label.clone(), t, trial))
            .collect()
    }

    pub fn runner(&self) -> &CaseRunner {
        &self.runner
    }

    /// Run every configuration; stops at the first quota abort.
    pub async fn run(&self, client: &dyn InferenceClient, cases: &[Case]) -> crate::Result<ExperimentReport> {
        let mut timing = TimingStore::load(self.runner.store().timing_path(&self.provider_label))?;
        let mut report = ExperimentReport {
            passes: Vec::new(),
            aborted: false,
        };

        for config in self.configurations() {
            let pass = self.runner.run_pass(client, &config, cases, &mut timing).await?;
            let aborted = pass.aborted;
            report.passes.push(pass);
            if aborted {
                warn!(config = %config, "Experiment aborted");
                report.aborted = true;
                break;
            }
        }

        info!(
            provider = %self.provider_label,
            passes = report.passes.len(),
            aborted = report.aborted,
            "Experiment finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configurations_order() {
        let mut config = Config::default();
        config.experiment.temperatures = vec![0.0, 1.0];
        config.experiment.trials = 2;
        let experiment = Experiment::from_config(&config, ProviderKind::OpenAi, Task::TextOnly);

        let names: Vec<_> = experiment.configurations().iter().map(|c| c.dir_name()).collect();
        assert_eq!(
            names,
            vec![
                "gpt4o_result_temp_0_0_try1",
                "gpt4o_result_temp_0_0_try2",
                "gpt4o_result_temp_1_0_try1",
                "gpt4o_result_temp_1_0_try2",
            ]
        );
    }
}
