//! Error taxonomy
//!
//! Two categories, both fail-fast:
//! - [`ConfigError`]: the run cannot be set up (or a policy meets input it was
//!   not configured for). Detected at construction or at the first relevant
//!   event.
//! - [`SimulationError::ContractViolation`]: a policy broke the per-tick
//!   contract. Indicates a bug; the run aborts on the spot.

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid model parameters: {0}")]
    InvalidModel(String),

    #[error("Amortization factor must be greater than one, but was {0}")]
    AmortizationFactorTooSmall(f64),

    #[error("Minimal value {min_value} must exceed the maintenance cost {maintenance_cost}")]
    MinimalValueTooSmall { min_value: f64, maintenance_cost: f64 },

    #[error("Policy {0} does not support deadlines")]
    DeadlinesUnsupported(String),

    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    #[error("Unknown estimator: {0}")]
    UnknownEstimator(String),

    #[error("Policy {0} requires the policy parameter to be set")]
    MissingPolicyParameter(String),

    #[error("Policy {0} requires a minimal deadline cushion")]
    MissingDeadlineCushion(String),

    #[error("Policy {0} requires a preemption tuning table")]
    MissingTuningTable(String),

    #[error("Invalid tuning table: {0}")]
    InvalidTuningTable(String),

    #[error("Invalid deadline parameters: {0}")]
    InvalidDeadlines(String),

    #[error("Invalid batch settings: {0}")]
    InvalidBatch(String),
}

/// Errors aborting a run
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Contract violation at tick {tick}: {message}")]
    ContractViolation { tick: usize, message: String },

    #[error("Invalid request {id}: {message}")]
    InvalidRequest { id: u64, message: String },

    #[error("Buffer still holds {buffered} requests after {ticks} drain ticks")]
    DrainStalled { ticks: usize, buffered: usize },

    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

impl SimulationError {
    /// Whether this error stems from configuration rather than a policy bug
    pub fn is_config_error(&self) -> bool {
        matches!(self, SimulationError::Config(_))
    }

    pub(crate) fn contract(tick: usize, message: impl Into<String>) -> Self {
        SimulationError::ContractViolation {
            tick,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_distinguishable() {
        let err: SimulationError = ConfigError::UnknownPolicy("foo".to_string()).into();
        assert!(err.is_config_error());
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown policy: foo"
        );

        let err = SimulationError::contract(3, "selected 2 with 1 ready");
        assert!(!err.is_config_error());
    }
}
