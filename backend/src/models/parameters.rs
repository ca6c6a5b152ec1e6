//! Model parameters
//!
//! Immutable for the duration of a run. All times are in slots, all costs in
//! the same unit as request values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orchestrator::ConfigError;

/// Infrastructure model for one run
///
/// # Example
/// ```
/// use admission_simulator_core_rs::ModelParameters;
///
/// let params = ModelParameters {
///     activation_delay: 2,
///     max_resources: 4,
///     allocation_cost: 1.0,
///     maintenance_cost: 0.1,
///     buffer_cap: Some(16),
/// };
/// assert!(params.validate().is_ok());
/// assert_eq!(params.to_string(), "(f=2dT,R=4,a=1,m=0.1/dT,B=16)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Slots between allocating a resource and it becoming ready
    pub activation_delay: usize,

    /// Upper bound on ready + pending resources
    pub max_resources: usize,

    /// One-time cost per allocated resource
    pub allocation_cost: f64,

    /// Cost per ready resource per slot (charged even when idle)
    pub maintenance_cost: f64,

    /// Cap on admitted, not yet finished requests (None = unbounded)
    #[serde(default)]
    pub buffer_cap: Option<usize>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            activation_delay: 0,
            max_resources: 1,
            allocation_cost: 0.0,
            maintenance_cost: 0.0,
            buffer_cap: None,
        }
    }
}

impl ModelParameters {
    /// Reject parameter points no run can be built from
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resources == 0 {
            return Err(ConfigError::InvalidModel(
                "max_resources must be > 0".to_string(),
            ));
        }
        if !self.allocation_cost.is_finite() || self.allocation_cost < 0.0 {
            return Err(ConfigError::InvalidModel(format!(
                "allocation_cost must be finite and non-negative, got {}",
                self.allocation_cost
            )));
        }
        if !self.maintenance_cost.is_finite() || self.maintenance_cost < 0.0 {
            return Err(ConfigError::InvalidModel(format!(
                "maintenance_cost must be finite and non-negative, got {}",
                self.maintenance_cost
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ModelParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(f={}dT,R={},a={},m={}/dT,B=",
            self.activation_delay, self.max_resources, self.allocation_cost, self.maintenance_cost
        )?;
        match self.buffer_cap {
            Some(cap) => write!(f, "{})", cap),
            None => write!(f, "infty)"),
        }
    }
}
