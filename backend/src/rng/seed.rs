//! Seeds derived from run identities
//!
//! The identity (any serializable value, typically label + model parameters
//! + policy name + deadline parameters + trial index) is rendered as JSON and
//! hashed with SHA-256; the first eight digest bytes form the seed.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Stable seed for `identity`
///
/// # Example
/// ```
/// use admission_simulator_core_rs::rng::seed_from_identity;
///
/// let a = seed_from_identity(&("trace", 3)).unwrap();
/// assert_eq!(a, seed_from_identity(&("trace", 3)).unwrap());
/// assert_ne!(a, seed_from_identity(&("trace", 4)).unwrap());
/// ```
pub fn seed_from_identity<T: Serialize + ?Sized>(identity: &T) -> Result<u64, serde_json::Error> {
    let canonical = serde_json::to_vec(identity)?;
    let digest = Sha256::digest(&canonical);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    Ok(u64::from_le_bytes(bytes))
}
