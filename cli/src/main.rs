//! Admission Simulator CLI
//!
//! Provides commands for:
//! - Running an experiment over a workload file
//! - Listing accepted policy names
//!
//! Binary: admission-sim
//!
//! Results go to stdout as one JSON object per line, logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use admission_simulator_core_rs::policy::TuningTable;
use admission_simulator_core_rs::{
    BatchRunner, CombineStrategy, ExperimentConfig, Metric, PolicyConfig, RunOutcome, Workload,
};

/// Admission simulator - compare admission policies on slotted workloads
#[derive(Parser)]
#[command(name = "admission-sim")]
#[command(about = "Slotted admission-control simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured policy over a workload
    Run {
        /// Experiment config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Workload: JSON array of slots, each an array of requests
        #[arg(short, long)]
        input: PathBuf,

        /// Worker threads
        #[arg(long, default_value_t = 1)]
        threads: usize,

        /// Trials per policy; more than one prints the combined metric
        #[arg(long, default_value_t = 1)]
        runs: usize,

        /// How trials are combined
        #[arg(long, default_value = "mean")]
        combine: CombineStrategy,

        /// Metric combined over trials
        #[arg(long, default_value = "objective-fraction")]
        metric: Metric,

        /// Empirical tuning table for pppq(c), pppq(opt) and pppq(var) (TSV)
        #[arg(long)]
        tuning_table: Option<PathBuf>,
    },

    /// List accepted policy name patterns
    Policies,
}

#[derive(Serialize)]
struct FailedRun<'a> {
    label: &'a str,
    policy: String,
    error: String,
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn print_line<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn run(
    config: &Path,
    input: &Path,
    threads: usize,
    runs: usize,
    combine: CombineStrategy,
    metric: Metric,
    tuning_table: Option<&Path>,
) -> anyhow::Result<()> {
    let mut experiment = ExperimentConfig::from_json(&read(config)?)
        .with_context(|| format!("invalid experiment config {}", config.display()))?;
    if let Some(path) = tuning_table {
        let table = TuningTable::from_tsv(&read(path)?)?;
        experiment.aux.tuning_table = Some(Arc::new(table));
    }
    let workload = Arc::new(
        Workload::from_json(&read(input)?)
            .with_context(|| format!("invalid workload {}", input.display()))?,
    );
    experiment.params.validate()?;

    info!(
        params = %experiment.params,
        policies = experiment.policies.len(),
        slots = workload.num_slots(),
        requests = workload.num_requests(),
        "running experiment"
    );

    let runner = BatchRunner::new(threads)?;
    let jobs = experiment.jobs(&workload, 0);
    let mut failures = 0usize;

    if runs > 1 {
        for job in &jobs {
            match runner.run_trials(job, runs, metric, combine) {
                Ok(combined) => print_line(&combined)?,
                Err(err) => {
                    failures += 1;
                    error!(policy = %job.config.policy, error = %err, "trials failed");
                    print_line(&FailedRun {
                        label: &job.label,
                        policy: job.config.policy.to_string(),
                        error: err.to_string(),
                    })?;
                }
            }
        }
    } else {
        for (job, outcome) in jobs.iter().zip(runner.run(jobs.clone())) {
            match outcome {
                Ok(outcome) => print_line::<RunOutcome>(&outcome)?,
                Err(err) => {
                    failures += 1;
                    print_line(&FailedRun {
                        label: &job.label,
                        policy: job.config.policy.to_string(),
                        error: err.to_string(),
                    })?;
                }
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} policies failed", failures, jobs.len());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            input,
            threads,
            runs,
            combine,
            metric,
            tuning_table,
        } => run(
            &config,
            &input,
            threads,
            runs,
            combine,
            metric,
            tuning_table.as_deref(),
        ),
        Commands::Policies => {
            for pattern in PolicyConfig::PATTERNS {
                println!("{}", pattern);
            }
            Ok(())
        }
    }
}
