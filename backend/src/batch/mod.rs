//! Batch execution of independent runs
//!
//! Runs share nothing but the read-only workload, so a batch is spread over a
//! bounded pool of scoped worker threads pulling jobs from one queue. Each
//! job builds its own orchestrator; a failing job yields an `Err` in its own
//! result slot and leaves the others untouched.
//!
//! Randomized deadline cushions are seeded from the experiment label, the
//! deadline parameters and the trial index only, so every policy of one
//! experiment sees the same input. Repeated trials differ only in the trial
//! index. Their final metric is combined with a [`CombineStrategy`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::accounting::{AccountingSnapshot, EstimatorKind};
use crate::arrivals::{DeadlineParameters, Workload};
use crate::models::{ModelParameters, Request};
use crate::orchestrator::{ConfigError, Orchestrator, OrchestratorConfig, SimulationError};
use crate::policy::{AuxiliaryPolicyParameters, PolicyConfig};
use crate::rng::seed_from_identity;

// ============================================================================
// Configuration Types
// ============================================================================

/// One experiment: a model, a workload treatment and the policies to compare
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Free-form name, part of every run's seed identity
    #[serde(default)]
    pub label: String,

    pub params: ModelParameters,

    pub policies: Vec<PolicyConfig>,

    #[serde(default)]
    pub estimator: EstimatorKind,

    #[serde(default)]
    pub aux: AuxiliaryPolicyParameters,

    /// Derive deadlines from scheduling classes (None = use input as is)
    #[serde(default)]
    pub deadlines: Option<DeadlineParameters>,

    #[serde(default)]
    pub max_drain_ticks: Option<usize>,
}

impl ExperimentConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// One job per policy for `trial`
    ///
    /// Fills in auxiliary parameters the experiment leaves open: the minimal
    /// value defaults to the workload's smallest value, the minimal deadline
    /// cushion to the smallest configured cushion.
    pub fn jobs(&self, workload: &Arc<Workload>, trial: usize) -> Vec<RunJob> {
        let mut aux = self.aux.clone();
        if aux.min_value <= 0.0 {
            aux.min_value = workload.min_value().unwrap_or(0.0);
        }
        if aux.min_deadline_cushion.is_none() {
            aux.min_deadline_cushion = self.deadlines.as_ref().map(DeadlineParameters::minimal_cushion);
        }

        self.policies
            .iter()
            .map(|policy| {
                let mut config = OrchestratorConfig::new(self.params.clone(), policy.clone());
                config.aux = aux.clone();
                config.estimator = self.estimator;
                config.max_drain_ticks = self.max_drain_ticks;
                RunJob {
                    label: self.label.clone(),
                    config,
                    workload: Arc::clone(workload),
                    deadlines: self.deadlines.clone(),
                    trial,
                }
            })
            .collect()
    }
}

/// Scalar extracted from a run for aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    Objective,
    ObjectiveFraction,
    AverageLatency,
    UpperBound,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Objective,
        Metric::ObjectiveFraction,
        Metric::AverageLatency,
        Metric::UpperBound,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Objective => "objective",
            Metric::ObjectiveFraction => "objective-fraction",
            Metric::AverageLatency => "average-latency",
            Metric::UpperBound => "upper-bound",
        }
    }

    /// None when the metric is undefined for the run (zero upper bound)
    pub fn extract(&self, snapshot: &AccountingSnapshot) -> Option<f64> {
        match self {
            Metric::Objective => Some(snapshot.objective),
            Metric::ObjectiveFraction => snapshot.objective_fraction,
            Metric::AverageLatency => Some(snapshot.average_latency),
            Metric::UpperBound => Some(snapshot.upper_bound),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s.trim())
            .ok_or_else(|| ConfigError::InvalidBatch(format!("unknown metric {}", s)))
    }
}

/// How repeated trials are summarized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineStrategy {
    #[default]
    Mean,
    /// Element at index `n / 2` of the sorted values
    Median,
}

impl CombineStrategy {
    pub fn combine(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            CombineStrategy::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            CombineStrategy::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                Some(sorted[sorted.len() / 2])
            }
        }
    }
}

impl FromStr for CombineStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(CombineStrategy::Mean),
            "median" => Ok(CombineStrategy::Median),
            _ => Err(ConfigError::InvalidBatch(format!("unknown combine strategy {}", s))),
        }
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// Everything one run needs
#[derive(Debug, Clone)]
pub struct RunJob {
    pub label: String,
    pub config: OrchestratorConfig,
    pub workload: Arc<Workload>,
    pub deadlines: Option<DeadlineParameters>,
    pub trial: usize,
}

/// Input identity a run's random source is derived from
///
/// Policy and model parameters stay out: policies compared in one experiment
/// must see identical inputs.
#[derive(Serialize)]
struct InputIdentity<'a> {
    label: &'a str,
    deadlines: Option<&'a DeadlineParameters>,
    trial: usize,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub label: String,
    pub policy: String,
    pub trial: usize,
    pub snapshot: AccountingSnapshot,
}

/// Metric combined over trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedOutcome {
    pub label: String,
    pub policy: String,
    pub metric: Metric,
    pub strategy: CombineStrategy,
    pub trials: usize,
    /// Trials whose metric was defined (objective fraction needs a nonzero bound)
    pub combined: usize,
    pub value: Option<f64>,
}

impl RunJob {
    /// Same job with another trial index
    pub fn with_trial(&self, trial: usize) -> Self {
        Self {
            trial,
            ..self.clone()
        }
    }

    pub fn seed(&self) -> Result<u64, SimulationError> {
        let identity = InputIdentity {
            label: &self.label,
            deadlines: self.deadlines.as_ref(),
            trial: self.trial,
        };
        seed_from_identity(&identity)
            .map_err(|e| SimulationError::WorkerFailed(format!("cannot derive seed: {}", e)))
    }

    /// Slots fed to the run, with deadlines derived when configured
    pub fn input(&self) -> Result<Vec<Vec<Request>>, SimulationError> {
        match &self.deadlines {
            Some(deadlines) => Ok(self.workload.with_deadlines(deadlines, self.seed()?)?),
            None => Ok(self.workload.to_slots()),
        }
    }

    /// Build the input, run it, and report
    pub fn execute(&self) -> Result<RunOutcome, SimulationError> {
        let slots = self.input()?;
        let mut config = self.config.clone();
        config.unit_processing = self.workload.is_unit_processing();

        let mut orchestrator = Orchestrator::new(config)?;
        let snapshot = orchestrator.run(&slots)?;
        Ok(RunOutcome {
            label: self.label.clone(),
            policy: orchestrator.policy_name().to_string(),
            trial: self.trial,
            snapshot,
        })
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Bounded worker pool for independent runs
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    num_threads: usize,
}

impl BatchRunner {
    pub fn new(num_threads: usize) -> Result<Self, ConfigError> {
        if num_threads == 0 {
            return Err(ConfigError::InvalidBatch(
                "number of threads must be at least 1".to_string(),
            ));
        }
        Ok(Self { num_threads })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Execute `jobs`; results come back in submission order
    pub fn run(&self, jobs: Vec<RunJob>) -> Vec<Result<RunOutcome, SimulationError>> {
        let total = jobs.len();
        let queue = Mutex::new(jobs.into_iter().enumerate().collect::<VecDeque<_>>());
        let results: Mutex<Vec<Option<Result<RunOutcome, SimulationError>>>> =
            Mutex::new((0..total).map(|_| None).collect());
        let workers = self.num_threads.min(total);

        tracing::info!(jobs = total, workers, "starting batch");
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let queue = &queue;
                    let results = &results;
                    scope.spawn(move || loop {
                        let next = match queue.lock() {
                            Ok(mut pending) => pending.pop_front(),
                            Err(_) => None,
                        };
                        let Some((index, job)) = next else {
                            break;
                        };
                        let outcome = job.execute();
                        if let Err(err) = &outcome {
                            tracing::warn!(
                                worker,
                                policy = %job.config.policy,
                                trial = job.trial,
                                error = %err,
                                "run failed"
                            );
                        }
                        if let Ok(mut slots) = results.lock() {
                            slots[index] = Some(outcome);
                        }
                    })
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    tracing::warn!("worker thread panicked");
                }
            }
        });

        let slots = results
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(SimulationError::WorkerFailed(
                        "job did not complete".to_string(),
                    ))
                })
            })
            .collect()
    }

    /// Run `trials` copies of `job` and combine `metric` over them
    ///
    /// Fails if any trial fails.
    pub fn run_trials(
        &self,
        job: &RunJob,
        trials: usize,
        metric: Metric,
        strategy: CombineStrategy,
    ) -> Result<CombinedOutcome, SimulationError> {
        if trials == 0 {
            return Err(ConfigError::InvalidBatch("at least one trial is required".to_string()).into());
        }
        let jobs = (0..trials).map(|trial| job.with_trial(trial)).collect();
        let mut values = Vec::with_capacity(trials);
        for outcome in self.run(jobs) {
            if let Some(value) = metric.extract(&outcome?.snapshot) {
                values.push(value);
            }
        }
        if values.len() < trials {
            tracing::warn!(
                policy = %job.config.policy,
                metric = metric.name(),
                skipped = trials - values.len(),
                "trials without a defined metric left out"
            );
        }
        Ok(CombinedOutcome {
            label: job.label.clone(),
            policy: job.config.policy.to_string(),
            metric,
            strategy,
            trials,
            combined: values.len(),
            value: strategy.combine(&values),
        })
    }
}
