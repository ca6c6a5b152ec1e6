//! Total order over requests by a floating-point score
//!
//! Every ordered set in the policies is keyed by a `RankKey`: lower score
//! ranks first ("better"), ties are broken by ascending request id. Scores
//! are compared with `f64::total_cmp`, so the order is total even for
//! infinities.

use std::cmp::Ordering;

use crate::models::RequestId;

/// Sort key: `(score, id)`, smallest first
///
/// Descending orders are expressed by negating the score:
///
/// ```
/// use admission_simulator_core_rs::structures::RankKey;
///
/// let high = RankKey::descending(10.0, 2);
/// let low = RankKey::descending(5.0, 1);
/// assert!(high < low);
/// assert_eq!(high.magnitude(), 10.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RankKey {
    score: f64,
    id: RequestId,
}

impl RankKey {
    /// Smaller `score` ranks first
    pub fn ascending(score: f64, id: RequestId) -> Self {
        Self { score, id }
    }

    /// Larger `score` ranks first
    pub fn descending(score: f64, id: RequestId) -> Self {
        Self { score: -score, id }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Raw score as stored (negated for descending keys)
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Score as passed to [`RankKey::descending`]
    pub fn magnitude(&self) -> f64 {
        -self.score
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey {}
