//! Vision Bench - Resumable benchmark harness for vision-language models
//!
//! Runs clinical image + question cases against a provider, recording raw
//! replies, parsed answers and per-call latency.

use anyhow::Context;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use vision_bench::app::cli::{Cli, Commands, ConfigAction};
use vision_bench::app::config::Config;
use vision_bench::dataset::Dataset;
use vision_bench::inference::{build_client, ProviderKind};
use vision_bench::runner::{Experiment, InvocationConfig, Task};
use vision_bench::storage::{
    combine_summaries, open_append, summarize_configuration, ResultStore, TimingStore,
};

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // `init` must work before any config exists
    if let Commands::Init { force } = cli.command {
        init_tracing(cli.verbose, None);
        return run_init(force, &config_path);
    }

    let config = if config_path.exists() {
        Config::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        if cli.config.is_some() {
            anyhow::bail!("Config file {} does not exist", config_path.display());
        }
        Config::default()
    };

    // Benchmark runs also keep a persistent log next to their results
    let log_file = match (&cli.command, config.runner.process_log_path()) {
        (Commands::Run { .. }, Some(path)) => Some(
            open_append(&path)
                .with_context(|| format!("Failed to open process log {}", path.display()))?,
        ),
        _ => None,
    };
    init_tracing(cli.verbose, log_file);

    match cli.command {
        Commands::Run {
            provider,
            task,
            temperatures,
            trials,
            delay,
            dataset,
        } => {
            let mut config = config;
            if !temperatures.is_empty() {
                config.experiment.temperatures = temperatures;
            }
            if let Some(trials) = trials {
                config.experiment.trials = trials;
            }
            if let Some(delay) = delay {
                config.runner.inter_case_delay_secs = delay;
            }
            if let Some(dataset) = dataset {
                config.dataset.path = dataset;
            }
            config.validate()?;
            run_benchmark(provider, task, &config)?;
        }
        Commands::Summarize {
            providers,
            task,
            temperatures,
            trials,
            output,
        } => {
            let mut config = config;
            if !temperatures.is_empty() {
                config.experiment.temperatures = temperatures;
            }
            if let Some(trials) = trials {
                config.experiment.trials = trials;
            }
            config.validate()?;
            run_summarize(&providers, task, output, &config)?;
        }
        Commands::Stats {
            provider,
            temperature,
            trial,
        } => {
            run_stats(provider, temperature, trial, &config)?;
        }
        Commands::Config { action } => {
            run_config(action, &config, &config_path)?;
        }
        Commands::Init { .. } => {}
    }

    Ok(())
}

/// Initialize tracing (--verbose enables debug-level output)
fn init_tracing(verbose: bool, log_file: Option<File>) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
}

fn run_benchmark(provider: ProviderKind, task: Task, config: &Config) -> anyhow::Result<()> {
    let cases = Dataset::from_config(&config.dataset)?.into_cases();
    let client = build_client(provider, config)?;
    let experiment = Experiment::from_config(config, provider, task);

    info!(
        provider = %provider,
        task = %task,
        cases = cases.len(),
        configurations = experiment.configurations().len(),
        "Starting benchmark"
    );

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let report = rt.block_on(experiment.run(client.as_ref(), &cases))?;

    println!("\nBenchmark Results:");
    for pass in &report.passes {
        println!(
            "  {}: {} new, {} skipped, {} without result, {} calls ({}s)",
            pass.config.dir_name(),
            pass.completed,
            pass.skipped,
            pass.failed.len(),
            pass.invocations,
            pass.duration().num_seconds()
        );
        for (case, failure) in &pass.failed {
            println!("    case {}: {:?}", case, failure);
        }
    }

    if report.aborted {
        anyhow::bail!("Run stopped early: {} quota exceeded", provider);
    }
    Ok(())
}

fn run_summarize(
    providers: &[ProviderKind],
    task: Task,
    output: Option<PathBuf>,
    config: &Config,
) -> anyhow::Result<()> {
    let cases = Dataset::from_config(&config.dataset)?.into_cases();
    let store = ResultStore::new(&config.runner.results_dir);
    let schema = task.schema();

    let mut tables = Vec::new();
    for provider in providers {
        let label = &provider.settings(&config.providers).label;
        for &temperature in &config.experiment.temperatures {
            for trial in 1..=config.experiment.trials {
                let invocation = InvocationConfig::new(label.clone(), temperature, trial);
                if !store.config_dir(&invocation).is_dir() {
                    warn!(config = %invocation, "No results directory, skipping");
                    continue;
                }
                let table = summarize_configuration(&store, &invocation, &cases, &schema)?;
                let answered = table.rows().iter().filter(|(_, a)| !a.is_empty()).count();
                println!(
                    "  {}: {}/{} answered -> {}",
                    invocation.dir_name(),
                    answered,
                    table.len(),
                    store.summary_path(&invocation).display()
                );
                tables.push((invocation, table));
            }
        }
    }

    if tables.is_empty() {
        anyhow::bail!("No results found under {}", store.root().display());
    }

    let output = output.unwrap_or_else(|| store.root().join("combined.csv"));
    combine_summaries(&tables, &output)?;
    println!("\nCombined summary saved to {}", output.display());
    Ok(())
}

fn run_stats(
    provider: ProviderKind,
    temperature: Option<f64>,
    trial: Option<u32>,
    config: &Config,
) -> anyhow::Result<()> {
    let label = &provider.settings(&config.providers).label;
    let path = ResultStore::new(&config.runner.results_dir).timing_path(label);
    if !path.exists() {
        anyhow::bail!("No timing file at {}", path.display());
    }
    let timing = TimingStore::load(&path)?;

    let filter = temperature.map(|t| (t, trial.unwrap_or(1)));
    let stats = match timing.stats(filter) {
        Some(stats) => stats,
        None => anyhow::bail!("No timing records match"),
    };

    println!("Timing for {} ({}):", label, path.display());
    println!("  Total data points: {}", stats.count);
    println!("  Average execution time: {:.2} seconds", stats.mean);
    println!("  Max execution time: {:.2} seconds", stats.max);
    println!("  Min execution time: {:.2} seconds", stats.min);
    println!("  Standard deviation: {:.2} seconds", stats.std_dev);
    Ok(())
}

fn run_init(force: bool, config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    let config = Config::default();
    config.save(config_path)?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);
    println!("\nAPI keys are read from the environment:");
    for provider in [ProviderKind::Anthropic, ProviderKind::OpenAi, ProviderKind::Gemini] {
        println!("  {}: ${}", provider, provider.settings(&config.providers).api_key_env);
    }
    Ok(())
}

fn run_config(action: ConfigAction, config: &Config, config_path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}
