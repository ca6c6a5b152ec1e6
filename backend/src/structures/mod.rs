//! Ordered containers used by the policies and the orchestrator

pub mod expiration;
pub mod pointed_queue;
pub mod rank_key;
pub mod sum_queue;

pub use expiration::ExpirationTracker;
pub use pointed_queue::PointedQueue;
pub use rank_key::RankKey;
pub use sum_queue::SumQueue;
