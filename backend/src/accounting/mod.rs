//! Accounting
//!
//! Tracks what a run cost and what it earned:
//! - allocation cost per resource allocated
//! - maintenance cost per ready resource per slot
//! - revenue (value) of completed requests
//! - latency (leave tick minus release tick) of every request that finished,
//!   completed or dropped
//!
//! The objective is `revenue - cost`. The objective fraction normalizes it by
//! the upper bound of the configured [`UpperBoundEstimator`].

pub mod estimator;

pub use estimator::{
    CapacityAwareEstimator, EstimatorKind, UnconstrainedEstimator, UpperBoundEstimator,
};

use serde::{Deserialize, Serialize};

use crate::core::time::TimeManager;
use crate::models::{ModelParameters, Request, SimRequest};

/// Running totals for one simulation
#[derive(Debug)]
pub struct Accounting {
    params: ModelParameters,
    estimator: Box<dyn UpperBoundEstimator>,

    /// Resources allocated over the run
    num_allocations: usize,

    /// Sum over slots of ready resources
    maintenance_ticks: usize,

    num_arrived: usize,
    num_completed: usize,
    num_dropped: usize,

    /// Value of completed requests
    revenue: f64,

    /// Sum of (leave tick - release tick) over completed and dropped requests
    total_latency: usize,
}

impl Accounting {
    pub fn new(params: ModelParameters, estimator: Box<dyn UpperBoundEstimator>) -> Self {
        Self {
            params,
            estimator,
            num_allocations: 0,
            maintenance_ticks: 0,
            num_arrived: 0,
            num_completed: 0,
            num_dropped: 0,
            revenue: 0.0,
            total_latency: 0,
        }
    }

    /// Feed one slot's arrivals to the estimator
    pub fn note_arrived(&mut self, arrived: &[Request]) {
        self.num_arrived += arrived.len();
        self.estimator.note_arrived(arrived);
    }

    /// Signal the end of the input (before the drain phase)
    pub fn finish(&mut self) {
        self.estimator.finish();
    }

    /// Charge the allocation cost for `count` new resources
    pub fn charge_allocation(&mut self, count: usize) {
        self.num_allocations += count;
    }

    /// Charge one slot of maintenance for `ready` resources
    pub fn charge_maintenance(&mut self, ready: usize) {
        self.maintenance_ticks += ready;
    }

    /// Record requests completing at the clock's current tick
    pub fn account_completed<'a>(
        &mut self,
        completed: impl IntoIterator<Item = &'a SimRequest>,
        clock: &TimeManager,
    ) {
        for request in completed {
            self.num_completed += 1;
            self.revenue += request.value();
            self.total_latency += clock.ticks_since(request.release_tick());
        }
    }

    /// Record requests dropped at the clock's current tick (at admission or when due)
    pub fn note_dropped<'a>(
        &mut self,
        dropped: impl IntoIterator<Item = &'a SimRequest>,
        clock: &TimeManager,
    ) {
        for request in dropped {
            self.num_dropped += 1;
            self.total_latency += clock.ticks_since(request.release_tick());
        }
    }

    pub fn allocation_cost(&self) -> f64 {
        self.num_allocations as f64 * self.params.allocation_cost
    }

    pub fn maintenance_cost(&self) -> f64 {
        self.maintenance_ticks as f64 * self.params.maintenance_cost
    }

    pub fn cost(&self) -> f64 {
        self.allocation_cost() + self.maintenance_cost()
    }

    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    pub fn objective(&self) -> f64 {
        self.revenue - self.cost()
    }

    pub fn upper_bound(&self) -> f64 {
        self.estimator.upper_bound()
    }

    /// `objective / upper_bound`; None when the bound is zero
    pub fn objective_fraction(&self) -> Option<f64> {
        let bound = self.upper_bound();
        if bound == 0.0 {
            None
        } else {
            Some(self.objective() / bound)
        }
    }

    /// Mean latency over completed and dropped requests (0 if none finished)
    pub fn average_latency(&self) -> f64 {
        let finished = self.num_completed + self.num_dropped;
        if finished == 0 {
            0.0
        } else {
            self.total_latency as f64 / finished as f64
        }
    }

    pub fn num_completed(&self) -> usize {
        self.num_completed
    }

    pub fn num_dropped(&self) -> usize {
        self.num_dropped
    }

    pub fn snapshot(&self) -> AccountingSnapshot {
        AccountingSnapshot {
            num_arrived: self.num_arrived,
            num_completed: self.num_completed,
            num_dropped: self.num_dropped,
            num_allocations: self.num_allocations,
            maintenance_ticks: self.maintenance_ticks,
            allocation_cost: self.allocation_cost(),
            maintenance_cost: self.maintenance_cost(),
            cost: self.cost(),
            revenue: self.revenue,
            objective: self.objective(),
            upper_bound: self.upper_bound(),
            objective_fraction: self.objective_fraction(),
            average_latency: self.average_latency(),
            total_latency: self.total_latency,
        }
    }
}

/// Final (or intermediate) figures of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingSnapshot {
    pub num_arrived: usize,
    pub num_completed: usize,
    pub num_dropped: usize,
    pub num_allocations: usize,
    pub maintenance_ticks: usize,
    pub allocation_cost: f64,
    pub maintenance_cost: f64,
    pub cost: f64,
    pub revenue: f64,
    pub objective: f64,
    pub upper_bound: f64,
    pub objective_fraction: Option<f64>,
    pub average_latency: f64,
    pub total_latency: usize,
}
