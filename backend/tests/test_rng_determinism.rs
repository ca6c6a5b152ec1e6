//! Tests for deterministic RNG
//!
//! Same seed MUST produce same sequence, on any thread.

use admission_simulator_core_rs::rng::seed_from_identity;
use admission_simulator_core_rs::RngManager;
use std::thread;

#[test]
fn test_zero_seed_behaves_like_one() {
    let mut zero = RngManager::new(0);
    let mut one = RngManager::new(1);
    for _ in 0..10 {
        assert_eq!(zero.next_u64(), one.next_u64());
    }
}

#[test]
fn test_rng_next_deterministic() {
    let mut rng1 = RngManager::new(12345);
    let mut rng2 = RngManager::new(12345);

    for _ in 0..100 {
        assert_eq!(rng1.next_u64(), rng2.next_u64(), "RNG not deterministic!");
    }
}

#[test]
fn test_rng_different_seeds_different_sequences() {
    let mut rng1 = RngManager::new(12345);
    let mut rng2 = RngManager::new(54321);

    assert_ne!(
        rng1.next_u64(),
        rng2.next_u64(),
        "Different seeds should produce different values"
    );
}

#[test]
fn test_unit_samples_in_range() {
    let mut rng = RngManager::new(7);
    for _ in 0..1000 {
        let u = rng.next_f64();
        assert!((0.0..1.0).contains(&u), "sample {} out of [0, 1)", u);
    }
}

#[test]
fn test_same_sequence_across_threads() {
    let seed = seed_from_identity(&("trace", 0usize)).unwrap();
    let reference: Vec<u64> = {
        let mut rng = RngManager::new(seed);
        (0..50).map(|_| rng.next_u64()).collect()
    };

    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(move || {
                let seed = seed_from_identity(&("trace", 0usize)).unwrap();
                let mut rng = RngManager::new(seed);
                (0..50).map(|_| rng.next_u64()).collect::<Vec<u64>>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), reference);
    }
}
