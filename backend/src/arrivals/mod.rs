//! Workloads and deadline derivation
//!
//! A workload is a finite sequence of time slots, each holding the requests
//! released in that slot. Requests carry a scheduling class; deadlines are
//! derived per class from [`DeadlineParameters`]:
//!
//! ```text
//! lower    = cushion[class] × scale
//! cushion  = lower                 (fixed)
//!          = u × lower + lower     (randomized, u uniform in [0, 1))
//! deadline = ceil(w × (1 + cushion))
//! ```
//!
//! Randomized cushions draw from an [`RngManager`], so a workload derived
//! with the same seed is always identical.
//!
//! # Example
//!
//! ```
//! use admission_simulator_core_rs::arrivals::{ClassedRequest, DeadlineParameters, Workload};
//! use admission_simulator_core_rs::Request;
//!
//! let workload = Workload::new(vec![vec![
//!     ClassedRequest::new(Request::new(0, 0, 1.0, 4), 0),
//!     ClassedRequest::new(Request::new(1, 0, 1.0, 2), 1),
//! ]]);
//! let deadlines = DeadlineParameters::new(vec![0.5, 1.0], 1.0, false);
//! let slots = workload.with_deadlines(&deadlines, 7).unwrap();
//! assert_eq!(slots[0][0].deadline, Some(6)); // ceil(4 × 1.5)
//! assert_eq!(slots[0][1].deadline, Some(4)); // ceil(2 × 2.0)
//! ```

use serde::{Deserialize, Serialize};

use crate::models::Request;
use crate::orchestrator::ConfigError;
use crate::rng::RngManager;

/// Request plus the scheduling class its deadline cushion depends on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassedRequest {
    #[serde(flatten)]
    pub request: Request,

    #[serde(default)]
    pub scheduling_class: usize,
}

impl ClassedRequest {
    pub fn new(request: Request, scheduling_class: usize) -> Self {
        Self {
            request,
            scheduling_class,
        }
    }
}

/// Per-class deadline cushions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineParameters {
    /// Cushion of each scheduling class, indexed by class
    pub cushions: Vec<f64>,

    /// Multiplier applied to every cushion
    pub scale: f64,

    /// Draw each cushion uniformly from `[lower, 2 × lower)`
    #[serde(default)]
    pub randomized: bool,
}

impl DeadlineParameters {
    pub fn new(cushions: Vec<f64>, scale: f64, randomized: bool) -> Self {
        Self {
            cushions,
            scale,
            randomized,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cushions.is_empty() {
            return Err(ConfigError::InvalidDeadlines(
                "at least one class cushion is required".to_string(),
            ));
        }
        if !self.scale.is_finite() || self.scale < 0.0 {
            return Err(ConfigError::InvalidDeadlines(format!(
                "scale must be finite and non-negative, got {}",
                self.scale
            )));
        }
        if let Some(bad) = self
            .cushions
            .iter()
            .find(|c| !c.is_finite() || **c < 0.0)
        {
            return Err(ConfigError::InvalidDeadlines(format!(
                "cushions must be finite and non-negative, got {}",
                bad
            )));
        }
        Ok(())
    }

    /// Smallest effective (non-randomized) cushion
    pub fn minimal_cushion(&self) -> f64 {
        self.cushions
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
            * self.scale
    }

    /// Cushion for a request of `class`
    pub fn effective_cushion(
        &self,
        class: usize,
        rng: &mut RngManager,
    ) -> Result<f64, ConfigError> {
        let cushion = self.cushions.get(class).ok_or_else(|| {
            ConfigError::InvalidDeadlines(format!(
                "no cushion for scheduling class {} ({} configured)",
                class,
                self.cushions.len()
            ))
        })?;
        let lower = cushion * self.scale;
        if self.randomized {
            Ok(rng.next_f64() * lower + lower)
        } else {
            Ok(lower)
        }
    }

    /// Deadline slack for `processing_time` at `cushion`
    pub fn deadline_for(processing_time: usize, cushion: f64) -> usize {
        (processing_time as f64 * (1.0 + cushion)).ceil() as usize
    }
}

/// Slotted sequence of classed requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workload {
    slots: Vec<Vec<ClassedRequest>>,
}

impl Workload {
    pub fn new(slots: Vec<Vec<ClassedRequest>>) -> Self {
        Self { slots }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn slots(&self) -> &[Vec<ClassedRequest>] {
        &self.slots
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_requests(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    fn requests(&self) -> impl Iterator<Item = &Request> {
        self.slots.iter().flatten().map(|r| &r.request)
    }

    /// Whether every request needs exactly one resource-tick
    pub fn is_unit_processing(&self) -> bool {
        self.requests().all(|r| r.processing_time == 1)
    }

    /// Smallest request value, if any request exists
    pub fn min_value(&self) -> Option<f64> {
        self.requests().map(|r| r.value).reduce(f64::min)
    }

    /// Requests as given (deadlines already present are kept)
    pub fn to_slots(&self) -> Vec<Vec<Request>> {
        self.slots
            .iter()
            .map(|slot| slot.iter().map(|r| r.request).collect())
            .collect()
    }

    /// Requests with deadlines derived from `params`, seeded by `seed`
    pub fn with_deadlines(
        &self,
        params: &DeadlineParameters,
        seed: u64,
    ) -> Result<Vec<Vec<Request>>, ConfigError> {
        params.validate()?;
        let mut rng = RngManager::new(seed);
        self.slots
            .iter()
            .map(|slot| {
                slot.iter()
                    .map(|classed| {
                        let cushion =
                            params.effective_cushion(classed.scheduling_class, &mut rng)?;
                        let request = classed.request;
                        Ok(request.with_deadline(DeadlineParameters::deadline_for(
                            request.processing_time,
                            cushion,
                        )))
                    })
                    .collect()
            })
            .collect()
    }
}
