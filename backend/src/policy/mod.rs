//! Admission and scheduling policies
//!
//! A policy decides, once per tick:
//! 1. which arriving (or buffered) requests to reject
//! 2. which buffered requests to advance on the ready resources
//! 3. how many resources it wants for the next allocation decision
//!
//! and is told whenever requests leave the buffer. Policies never own
//! requests: they hold [`RequestId`]s and read everything else through the
//! [`SimulationView`] passed to each callback.
//!
//! # Strategies
//!
//! | Name                          | Type                        |
//! |-------------------------------|-----------------------------|
//! | `threshold`                   | [`ThresholdPolicy`]         |
//! | `pq(<order>)`                 | [`PriorityQueuePolicy`]     |
//! | `batch(<rho>\|var)`           | [`AmortizedBatchPolicy`]    |
//! | `pppq(<b>:<y>\|<c>\|opt\|var[:wc])` | [`PreemptivePolicy`]  |
//! | `smooth(<order>:<stat>:<n>)`  | [`SmoothingPolicy`]         |
//!
//! Names parse into a [`PolicyConfig`], which builds the policy instance for
//! one run via [`PolicyConfig::create`].

pub mod amortized;
pub mod preemptive;
pub mod priority_queue;
pub mod smoothing;
pub mod threshold;
pub mod tuning;

pub use amortized::AmortizedBatchPolicy;
pub use preemptive::{PreemptionParameters, PreemptivePolicy};
pub use priority_queue::{PriorityOrder, PriorityQueuePolicy};
pub use smoothing::{SmoothingPolicy, SmoothingStatistic};
pub use threshold::ThresholdPolicy;
pub use tuning::{TuningEntry, TuningTable};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::context::SimulationView;
use crate::models::{ModelParameters, RequestId};
use crate::orchestrator::ConfigError;

/// Why requests leave the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaveReason {
    Completed,
    Due,
}

/// Per-tick decision interface between the orchestrator and a strategy
///
/// Each method is called exactly once per tick, in the orchestrator's fixed
/// order. Returned ids must satisfy the contracts documented per method; the
/// orchestrator aborts the run on any violation.
pub trait AdmissionPolicy: Send {
    /// Requests to reject, drawn from `arriving` or the current buffer
    ///
    /// `arriving` are already resolvable through `view` but are not part of
    /// the buffer yet. When a buffer cap is set, the buffer after this round
    /// must not exceed it.
    fn select_for_drop(&mut self, arriving: &[RequestId], view: &SimulationView<'_>)
        -> Vec<RequestId>;

    /// Distinct buffered requests to advance by one tick, at most
    /// `view.ready_resources()` of them
    fn select_for_processing(&mut self, view: &SimulationView<'_>) -> Vec<RequestId>;

    /// Called right after the selected requests were advanced
    fn handle_processing_finished(&mut self, view: &SimulationView<'_>);

    /// Resources wanted for the next allocation decision
    fn predict_processing_capacity(&mut self, view: &SimulationView<'_>) -> usize;

    /// Requests that just left the buffer
    fn handle_buffer_leave(
        &mut self,
        leaving: &[RequestId],
        reason: LeaveReason,
        view: &SimulationView<'_>,
    ) -> Result<(), ConfigError>;
}

/// Tunables shared by every policy of an experiment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuxiliaryPolicyParameters {
    /// Smallest deadline cushion of the workload (see `pppq(opt)`)
    #[serde(default)]
    pub min_deadline_cushion: Option<f64>,

    /// Smallest request value the workload can produce (see `batch`)
    #[serde(default)]
    pub min_value: f64,

    /// Free scalar consumed by the `var` policy variants
    #[serde(default)]
    pub policy_param: Option<f64>,

    /// Empirical preemption tuning table, loaded separately
    #[serde(skip)]
    pub tuning_table: Option<Arc<TuningTable>>,
}

/// Amortization factor source of the batch policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amortization {
    Fixed(f64),
    /// Taken from [`AuxiliaryPolicyParameters::policy_param`]
    Variable,
}

/// Parameter source of the preemptive policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreemptionTuning {
    /// Explicit pessimism and preemption factors
    Factors { pessimism: f64, preemption: f64 },
    /// Tuning table lookup at a fixed cushion
    Cushion(f64),
    /// Tuning table lookup at the workload's minimal cushion
    MinimalCushion,
    /// Tuning table lookup at the cushion given as policy parameter
    Variable,
}

/// Policy selection, parsed from and rendered to a policy name
///
/// # Example
/// ```
/// use admission_simulator_core_rs::policy::{PolicyConfig, PriorityOrder};
///
/// let config: PolicyConfig = "pq(v/w)".parse().unwrap();
/// assert_eq!(config, PolicyConfig::PriorityQueue { order: PriorityOrder::ValueByRemaining });
/// assert_eq!(config.to_string(), "pq(v/w)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PolicyConfig {
    /// Baseline: admit positive-density requests while the buffer has room
    Threshold,

    /// Single-order priority queue
    PriorityQueue { order: PriorityOrder },

    /// Amortized batch allocation
    AmortizedBatch { amortization: Amortization },

    /// Pessimistic-preemptive deadline-aware queue
    Preemptive {
        tuning: PreemptionTuning,
        work_conserving: bool,
    },

    /// Priority queue with smoothed capacity predictions
    Smoothing {
        order: PriorityOrder,
        statistic: SmoothingStatistic,
        window: usize,
    },
}

impl PolicyConfig {
    /// Accepted name patterns, for help output
    pub const PATTERNS: [&'static str; 5] = [
        "threshold",
        "pq(v/w|v/d|v/wi|-d|v|-w)",
        "batch(<rho>|var)",
        "pppq(<b>:<y>|<cushion>|opt|var[:wc])",
        "smooth(<order>:mean|median:<window>)",
    ];

    /// Build a fresh policy instance for one run
    pub fn create(
        &self,
        params: &ModelParameters,
        aux: &AuxiliaryPolicyParameters,
    ) -> Result<Box<dyn AdmissionPolicy>, ConfigError> {
        let policy: Box<dyn AdmissionPolicy> = match self {
            PolicyConfig::Threshold => Box::new(ThresholdPolicy::new()),
            PolicyConfig::PriorityQueue { order } => Box::new(PriorityQueuePolicy::new(*order)),
            PolicyConfig::AmortizedBatch { amortization } => {
                let factor = match amortization {
                    Amortization::Fixed(factor) => *factor,
                    Amortization::Variable => aux
                        .policy_param
                        .ok_or_else(|| ConfigError::MissingPolicyParameter(self.to_string()))?,
                };
                Box::new(AmortizedBatchPolicy::new(params, aux.min_value, factor)?)
            }
            PolicyConfig::Preemptive {
                tuning,
                work_conserving,
            } => {
                let parameters = self.preemption_parameters(*tuning, aux)?;
                Box::new(PreemptivePolicy::new(params, parameters, *work_conserving))
            }
            PolicyConfig::Smoothing {
                order,
                statistic,
                window,
            } => Box::new(SmoothingPolicy::new(
                PriorityQueuePolicy::new(*order),
                *statistic,
                *window,
            )),
        };
        Ok(policy)
    }

    fn preemption_parameters(
        &self,
        tuning: PreemptionTuning,
        aux: &AuxiliaryPolicyParameters,
    ) -> Result<PreemptionParameters, ConfigError> {
        let cushion = match tuning {
            PreemptionTuning::Factors {
                pessimism,
                preemption,
            } => return Ok(PreemptionParameters::new(pessimism, preemption)),
            PreemptionTuning::Cushion(cushion) => cushion,
            PreemptionTuning::MinimalCushion => aux
                .min_deadline_cushion
                .ok_or_else(|| ConfigError::MissingDeadlineCushion(self.to_string()))?,
            PreemptionTuning::Variable => aux
                .policy_param
                .ok_or_else(|| ConfigError::MissingPolicyParameter(self.to_string()))?,
        };
        let table = aux
            .tuning_table
            .as_ref()
            .ok_or_else(|| ConfigError::MissingTuningTable(self.to_string()))?;
        Ok(table.lookup(cushion).parameters())
    }

    /// Whether the policy can run on a workload with deadlines
    pub fn supports_deadlines(&self) -> bool {
        !matches!(self, PolicyConfig::AmortizedBatch { .. })
    }
}

impl fmt::Display for PolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyConfig::Threshold => write!(f, "threshold"),
            PolicyConfig::PriorityQueue { order } => write!(f, "pq({})", order),
            PolicyConfig::AmortizedBatch { amortization } => match amortization {
                Amortization::Fixed(factor) => write!(f, "batch({})", factor),
                Amortization::Variable => write!(f, "batch(var)"),
            },
            PolicyConfig::Preemptive {
                tuning,
                work_conserving,
            } => {
                match tuning {
                    PreemptionTuning::Factors {
                        pessimism,
                        preemption,
                    } => write!(f, "pppq({}:{}", pessimism, preemption)?,
                    PreemptionTuning::Cushion(cushion) => write!(f, "pppq({}", cushion)?,
                    PreemptionTuning::MinimalCushion => write!(f, "pppq(opt")?,
                    PreemptionTuning::Variable => write!(f, "pppq(var")?,
                }
                if *work_conserving {
                    write!(f, ":wc")?;
                }
                write!(f, ")")
            }
            PolicyConfig::Smoothing {
                order,
                statistic,
                window,
            } => write!(f, "smooth({}:{}:{})", order, statistic, window),
        }
    }
}

fn parse_factor(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

impl FromStr for PolicyConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let unknown = || ConfigError::UnknownPolicy(s.to_string());

        if name.eq_ignore_ascii_case("threshold") {
            return Ok(PolicyConfig::Threshold);
        }

        let (head, args) = name
            .strip_suffix(')')
            .and_then(|rest| rest.split_once('('))
            .ok_or_else(unknown)?;

        match head.to_ascii_lowercase().as_str() {
            "pq" => Ok(PolicyConfig::PriorityQueue {
                order: args.parse().map_err(|_| unknown())?,
            }),
            "batch" => {
                let amortization = if args == "var" {
                    Amortization::Variable
                } else {
                    Amortization::Fixed(parse_factor(args).ok_or_else(unknown)?)
                };
                Ok(PolicyConfig::AmortizedBatch { amortization })
            }
            "pppq" => {
                let (body, work_conserving) = match args.strip_suffix(":wc") {
                    Some(body) => (body, true),
                    None => (args, false),
                };
                let tuning = match body {
                    "opt" => PreemptionTuning::MinimalCushion,
                    "var" => PreemptionTuning::Variable,
                    _ => match body.split_once(':') {
                        Some((b, y)) => PreemptionTuning::Factors {
                            pessimism: parse_factor(b).ok_or_else(unknown)?,
                            preemption: parse_factor(y).ok_or_else(unknown)?,
                        },
                        None => PreemptionTuning::Cushion(parse_factor(body).ok_or_else(unknown)?),
                    },
                };
                Ok(PolicyConfig::Preemptive {
                    tuning,
                    work_conserving,
                })
            }
            "smooth" => {
                let mut parts = args.split(':');
                let (Some(order), Some(statistic), Some(window), None) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    return Err(unknown());
                };
                let window: usize = window.parse().map_err(|_| unknown())?;
                if window == 0 {
                    return Err(unknown());
                }
                Ok(PolicyConfig::Smoothing {
                    order: order.parse().map_err(|_| unknown())?,
                    statistic: statistic.parse().map_err(|_| unknown())?,
                    window,
                })
            }
            _ => Err(unknown()),
        }
    }
}

impl TryFrom<String> for PolicyConfig {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PolicyConfig> for String {
    fn from(config: PolicyConfig) -> Self {
        config.to_string()
    }
}
