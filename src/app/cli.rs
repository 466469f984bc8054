//! Command-Line Interface

use crate::inference::ProviderKind;
use crate::runner::Task;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vision Bench - Benchmark vision-language models on clinical image cases
#[derive(Parser, Debug)]
#[command(name = "vision-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark for one provider, resuming where the last run stopped
    Run {
        /// Provider to evaluate
        #[arg(short, long, value_enum)]
        provider: ProviderKind,

        /// Benchmark task
        #[arg(short, long, value_enum, default_value = "image-challenge")]
        task: Task,

        /// Sampling temperature (repeatable; overrides the config)
        #[arg(long = "temperature")]
        temperatures: Vec<f64>,

        /// Trials per temperature (overrides the config)
        #[arg(long)]
        trials: Option<u32>,

        /// Seconds to wait before each case (overrides the config)
        #[arg(long)]
        delay: Option<f64>,

        /// Dataset CSV (overrides the config)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Re-parse stored results into per-configuration and combined answer tables
    Summarize {
        /// Providers to include (repeatable)
        #[arg(short, long = "provider", value_enum, required = true)]
        providers: Vec<ProviderKind>,

        /// Benchmark task whose results are summarized
        #[arg(short, long, value_enum, default_value = "image-challenge")]
        task: Task,

        /// Temperatures to include (repeatable; overrides the config)
        #[arg(long = "temperature")]
        temperatures: Vec<f64>,

        /// Trials per temperature (overrides the config)
        #[arg(long)]
        trials: Option<u32>,

        /// Combined output file (default: <results_dir>/combined.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show latency statistics for a provider
    Stats {
        /// Provider whose timing file is read
        #[arg(short, long, value_enum)]
        provider: ProviderKind,

        /// Only this temperature
        #[arg(long)]
        temperature: Option<f64>,

        /// Only this trial (requires --temperature)
        #[arg(long, requires = "temperature")]
        trial: Option<u32>,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the config file path
    Path,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
