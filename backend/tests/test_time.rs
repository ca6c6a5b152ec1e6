//! Tests for TimeManager

use admission_simulator_core_rs::TimeManager;

#[test]
fn test_time_manager_new() {
    let time = TimeManager::new();
    assert_eq!(time.current_tick(), 0);
}

#[test]
fn test_advance_tick() {
    let mut time = TimeManager::new();

    time.advance_tick();
    assert_eq!(time.current_tick(), 1);

    time.advance_tick();
    assert_eq!(time.current_tick(), 2);
}

#[test]
fn test_ticks_since_release() {
    let mut time = TimeManager::new();
    for _ in 0..10 {
        time.advance_tick();
    }

    assert_eq!(time.ticks_since(0), 10);
    assert_eq!(time.ticks_since(10), 0);
    assert_eq!(time.ticks_since(12), 0);
}

#[test]
fn test_default_matches_new() {
    assert_eq!(TimeManager::default().current_tick(), TimeManager::new().current_tick());
}
