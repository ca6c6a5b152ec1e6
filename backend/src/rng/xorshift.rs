//! xorshift64* random number generator
//!
//! 64-bit state, 64-bit output, passes BigCrush. Same seed gives the same
//! sequence, which is what makes randomized deadline cushions reproducible
//! across repeated and parallel runs.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use admission_simulator_core_rs::RngManager;
///
/// let mut a = RngManager::new(12345);
/// let mut b = RngManager::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// let u = a.next_f64();
/// assert!((0.0..1.0).contains(&u));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    state: u64,
}

impl RngManager {
    /// Create a generator; a zero seed is replaced by 1 (xorshift never
    /// leaves the zero state)
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform sample in `[0.0, 1.0)` from the top 53 bits
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next_u64();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }
}
