//! End-to-end scenarios through the orchestrator

use admission_simulator_core_rs::policy::{PolicyConfig, PriorityOrder};
use admission_simulator_core_rs::{ModelParameters, Orchestrator, OrchestratorConfig, Request};

fn orchestrator(params: ModelParameters, policy: PolicyConfig) -> Orchestrator {
    Orchestrator::new(OrchestratorConfig::new(params, policy)).unwrap()
}

/// One resource, no delay, no costs
fn free_single_resource() -> ModelParameters {
    ModelParameters {
        activation_delay: 0,
        max_resources: 1,
        allocation_cost: 0.0,
        maintenance_cost: 0.0,
        buffer_cap: None,
    }
}

#[test]
fn test_scenario_a_baseline_serves_everything() {
    let mut orchestrator = orchestrator(free_single_resource(), PolicyConfig::Threshold);
    let slots: Vec<Vec<Request>> = (0..5)
        .map(|t| vec![Request::new(t as u64, t, 10.0, 1)])
        .collect();

    let snapshot = orchestrator.run(&slots).unwrap();

    assert_eq!(snapshot.objective, 50.0);
    assert_eq!(snapshot.num_completed, 5);
    assert_eq!(snapshot.num_dropped, 0);
    assert_eq!(snapshot.upper_bound, 50.0);
    assert_eq!(snapshot.objective_fraction, Some(1.0));
    // Each request finishes in the slot it arrives
    assert_eq!(snapshot.average_latency, 0.0);
}

#[test]
fn test_scenario_b_single_slot_buffer_admits_lowest_id() {
    let params = ModelParameters {
        buffer_cap: Some(1),
        ..free_single_resource()
    };
    let mut orchestrator = orchestrator(params, PolicyConfig::Threshold);

    let tick = orchestrator
        .process_time_slot(&[Request::new(0, 0, 10.0, 2), Request::new(1, 0, 10.0, 2)])
        .unwrap();
    assert_eq!(tick.num_rejected, 1);
    assert_eq!(tick.buffered, 1);
    assert!(orchestrator.buffered().contains(&0));

    orchestrator.finish_input();
    orchestrator.drain().unwrap();
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.num_completed, 1);
    assert_eq!(snapshot.num_dropped, 1);
    assert_eq!(snapshot.revenue, 10.0);
}

#[test]
fn test_zero_buffer_admits_nothing() {
    let params = ModelParameters {
        buffer_cap: Some(0),
        ..free_single_resource()
    };
    let mut orchestrator = orchestrator(params, PolicyConfig::Threshold);
    let snapshot = orchestrator
        .run(&[vec![Request::new(0, 0, 10.0, 2), Request::new(1, 0, 10.0, 2)]])
        .unwrap();
    assert_eq!(snapshot.num_completed, 0);
    assert_eq!(snapshot.num_dropped, 2);
    assert_eq!(snapshot.num_allocations, 0);
}

#[test]
fn test_scenario_c_priority_queue_serves_higher_value_first() {
    let mut orchestrator = orchestrator(
        free_single_resource(),
        PolicyConfig::PriorityQueue {
            order: PriorityOrder::Value,
        },
    );

    let first = orchestrator
        .process_time_slot(&[Request::new(0, 0, 5.0, 2), Request::new(1, 0, 10.0, 2)])
        .unwrap();
    assert_eq!(first.num_completed, 0);
    assert_eq!(
        orchestrator.requests().get(1).unwrap().remaining_processing_time(),
        1
    );
    assert_eq!(
        orchestrator.requests().get(0).unwrap().remaining_processing_time(),
        2
    );

    let second = orchestrator.process_time_slot(&[]).unwrap();
    assert_eq!(second.num_completed, 1);
    assert!(orchestrator.requests().get(1).unwrap().is_complete());
    assert!(!orchestrator.buffered().contains(&1));

    orchestrator.finish_input();
    assert_eq!(orchestrator.drain().unwrap(), 2);
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.num_completed, 2);
    assert_eq!(snapshot.revenue, 15.0);
    // latencies 1 and 3
    assert_eq!(snapshot.total_latency, 4);
}

#[test]
fn test_maintenance_charged_for_idle_ready_resources() {
    let params = ModelParameters {
        max_resources: 2,
        allocation_cost: 1.0,
        maintenance_cost: 0.5,
        ..free_single_resource()
    };
    let mut orchestrator = orchestrator(params, PolicyConfig::Threshold);
    let snapshot = orchestrator
        .run(&[vec![Request::new(0, 0, 10.0, 1), Request::new(1, 0, 10.0, 1)]])
        .unwrap();

    assert_eq!(snapshot.num_allocations, 2);
    assert_eq!(snapshot.maintenance_ticks, 2);
    assert_eq!(snapshot.cost, 3.0);
    assert_eq!(snapshot.objective, 17.0);
}

#[test]
fn test_activation_delay_postpones_service() {
    let params = ModelParameters {
        activation_delay: 2,
        ..free_single_resource()
    };
    let mut orchestrator = orchestrator(params, PolicyConfig::Threshold);
    let snapshot = orchestrator.run(&[vec![Request::new(0, 0, 4.0, 1)]]).unwrap();

    assert_eq!(snapshot.num_completed, 1);
    // allocated after tick 0, ready at tick 2
    assert_eq!(snapshot.average_latency, 2.0);
}

#[test]
fn test_deadline_expiry_drops_unserved_request() {
    let mut orchestrator = orchestrator(
        free_single_resource(),
        PolicyConfig::PriorityQueue {
            order: PriorityOrder::Value,
        },
    );
    let slots = vec![vec![
        Request::new(0, 0, 10.0, 2).with_deadline(2),
        Request::new(1, 0, 1.0, 2).with_deadline(2),
    ]];
    let snapshot = orchestrator.run(&slots).unwrap();

    assert_eq!(snapshot.num_completed, 1);
    assert_eq!(snapshot.num_dropped, 1);
    assert_eq!(snapshot.revenue, 10.0);
}
