//! Offline upper bounds on the achievable objective
//!
//! The objective of a run is normalized by an estimate of what an offline
//! scheduler could have earned. Two estimators:
//!
//! - [`UnconstrainedEstimator`]: every request with positive hot unit value
//!   contributes `hot × w`. Ignores the resource cap, so it is loose but cheap.
//! - [`CapacityAwareEstimator`]: meant for unit processing. Keeps the
//!   not-yet-counted arrivals in a best-density-first queue (optionally capped
//!   at the buffer size) and each slot counts the best `max_resources` of
//!   them. Whatever is still queued at the end of the input is counted
//!   unconditionally.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::{ModelParameters, Request};
use crate::orchestrator::ConfigError;
use crate::structures::RankKey;

/// Upper-bound estimator fed with every arrival of a run
pub trait UpperBoundEstimator: Send + fmt::Debug {
    /// Account for one slot's arrivals (called once per slot, drain included)
    fn note_arrived(&mut self, arrived: &[Request]);

    /// End-of-input adjustment
    fn finish(&mut self);

    fn upper_bound(&self) -> f64;
}

/// Ignores capacity: sums `hot × w` over positive-density requests
#[derive(Debug, Clone)]
pub struct UnconstrainedEstimator {
    params: ModelParameters,
    upper_bound: f64,
}

impl UnconstrainedEstimator {
    pub fn new(params: ModelParameters) -> Self {
        Self {
            params,
            upper_bound: 0.0,
        }
    }
}

impl UpperBoundEstimator for UnconstrainedEstimator {
    fn note_arrived(&mut self, arrived: &[Request]) {
        self.upper_bound += arrived
            .iter()
            .map(|r| r.hot_unit_value(&self.params) * r.processing_time as f64)
            .filter(|v| *v > 0.0)
            .sum::<f64>();
    }

    fn finish(&mut self) {}

    fn upper_bound(&self) -> f64 {
        self.upper_bound
    }
}

/// Greedy per-slot bound for unit-processing workloads
#[derive(Debug, Clone)]
pub struct CapacityAwareEstimator {
    params: ModelParameters,
    limit_buffer: bool,
    /// Best hot unit value first; value is the request's contribution
    queue: BTreeMap<RankKey, f64>,
    upper_bound: f64,
}

impl CapacityAwareEstimator {
    pub fn new(params: ModelParameters, limit_buffer: bool) -> Self {
        Self {
            params,
            limit_buffer,
            queue: BTreeMap::new(),
            upper_bound: 0.0,
        }
    }

    /// Requests carried over to later slots
    pub fn num_queued(&self) -> usize {
        self.queue.len()
    }

    fn drain_best(&mut self, count: usize) -> f64 {
        let mut total = 0.0;
        for _ in 0..count {
            match self.queue.pop_first() {
                Some((_, contribution)) => total += contribution,
                None => break,
            }
        }
        total
    }
}

impl UpperBoundEstimator for CapacityAwareEstimator {
    fn note_arrived(&mut self, arrived: &[Request]) {
        for request in arrived {
            let hot = request.hot_unit_value(&self.params);
            if hot > 0.0 {
                self.queue.insert(
                    RankKey::descending(hot, request.id),
                    hot * request.processing_time as f64,
                );
            }
        }
        if self.limit_buffer {
            if let Some(cap) = self.params.buffer_cap {
                while self.queue.len() > cap {
                    self.queue.pop_last();
                }
            }
        }
        self.upper_bound += self.drain_best(self.params.max_resources);
    }

    fn finish(&mut self) {
        // Counts the leftovers without any capacity limit.
        self.upper_bound += self.drain_best(self.queue.len());
    }

    fn upper_bound(&self) -> f64 {
        self.upper_bound
    }
}

/// Which estimator a run normalizes against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    /// Capacity-aware (buffer-limited) for unit processing, otherwise unconstrained
    #[default]
    Smart,
    Simple,
    OnlyValueBuffer,
    OnlyValueNoBuffer,
}

impl EstimatorKind {
    pub const ALL: [EstimatorKind; 4] = [
        EstimatorKind::Smart,
        EstimatorKind::Simple,
        EstimatorKind::OnlyValueBuffer,
        EstimatorKind::OnlyValueNoBuffer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EstimatorKind::Smart => "smart",
            EstimatorKind::Simple => "simple",
            EstimatorKind::OnlyValueBuffer => "only-value-buffer",
            EstimatorKind::OnlyValueNoBuffer => "only-value-no-buffer",
        }
    }

    /// Build the estimator for a run
    ///
    /// `unit_processing` tells whether every request of the workload needs
    /// exactly one resource-tick.
    pub fn build(
        &self,
        params: &ModelParameters,
        unit_processing: bool,
    ) -> Box<dyn UpperBoundEstimator> {
        let params = params.clone();
        match self {
            EstimatorKind::Smart if unit_processing => {
                let limit_buffer = params.buffer_cap.is_some();
                Box::new(CapacityAwareEstimator::new(params, limit_buffer))
            }
            EstimatorKind::Smart | EstimatorKind::Simple => {
                Box::new(UnconstrainedEstimator::new(params))
            }
            EstimatorKind::OnlyValueBuffer => Box::new(CapacityAwareEstimator::new(params, true)),
            EstimatorKind::OnlyValueNoBuffer => {
                Box::new(CapacityAwareEstimator::new(params, false))
            }
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EstimatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        EstimatorKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| ConfigError::UnknownEstimator(s.to_string()))
    }
}
