//! Domain models for the admission simulator

pub mod parameters;
pub mod request;

// Re-exports
pub use parameters::ModelParameters;
pub use request::{Request, RequestId, RequestStore, SimRequest};
