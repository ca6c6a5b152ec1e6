//! Tests for the batch runner

use std::sync::Arc;

use admission_simulator_core_rs::arrivals::{ClassedRequest, DeadlineParameters, Workload};
use admission_simulator_core_rs::batch::{
    BatchRunner, CombineStrategy, ExperimentConfig, Metric, RunJob,
};
use admission_simulator_core_rs::{
    ConfigError, EstimatorKind, ModelParameters, OrchestratorConfig, Request, SimulationError,
};

fn workload() -> Arc<Workload> {
    let slots = (0..6)
        .map(|t| {
            (0..3)
                .map(|k| {
                    let id = (t * 3 + k) as u64;
                    let value = 1.0 + ((id * 7) % 5) as f64;
                    ClassedRequest::new(Request::new(id, t, value, 1 + k), k % 2)
                })
                .collect()
        })
        .collect();
    Arc::new(Workload::new(slots))
}

fn experiment() -> ExperimentConfig {
    ExperimentConfig::from_json(
        r#"{
            "label": "mixed",
            "params": {
                "activation_delay": 1,
                "max_resources": 2,
                "allocation_cost": 1.0,
                "maintenance_cost": 0.25,
                "buffer_cap": 6
            },
            "policies": ["threshold", "pq(v/w)", "pppq(0.5:1.5:wc)", "smooth(-d:mean:3)"],
            "deadlines": { "cushions": [1.0, 2.0], "scale": 1.0, "randomized": true },
            "max_drain_ticks": 500
        }"#,
    )
    .unwrap()
}

#[test]
fn test_experiment_defaults() {
    let experiment = experiment();
    assert_eq!(experiment.estimator.name(), "smart");
    assert_eq!(experiment.policies.len(), 4);

    let jobs = experiment.jobs(&workload(), 0);
    assert_eq!(jobs.len(), 4);
    for job in &jobs {
        assert_eq!(job.config.aux.min_value, 1.0);
        assert_eq!(job.config.aux.min_deadline_cushion, Some(1.0));
        assert_eq!(job.config.max_drain_ticks, Some(500));
    }
}

#[test]
fn test_results_keep_submission_order() {
    let jobs = experiment().jobs(&workload(), 0);
    let expected: Vec<String> = jobs.iter().map(|j| j.config.policy.to_string()).collect();

    let outcomes = BatchRunner::new(3).unwrap().run(jobs);
    let policies: Vec<String> = outcomes
        .into_iter()
        .map(|outcome| outcome.unwrap().policy)
        .collect();
    assert_eq!(policies, expected);
}

#[test]
fn test_thread_count_does_not_change_results() {
    let jobs = experiment().jobs(&workload(), 3);
    let serial: Vec<_> = BatchRunner::new(1)
        .unwrap()
        .run(jobs.clone())
        .into_iter()
        .map(Result::unwrap)
        .collect();
    let parallel: Vec<_> = BatchRunner::new(4)
        .unwrap()
        .run(jobs)
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(serial, parallel);
}

#[test]
fn test_failing_job_does_not_affect_siblings() {
    let mut jobs = experiment().jobs(&workload(), 0);
    let mut broken = jobs[0].clone();
    // batch allocation cannot honor the derived deadlines
    broken.config.policy = "batch(2)".parse().unwrap();
    jobs.insert(1, broken);

    let outcomes = BatchRunner::new(2).unwrap().run(jobs);
    assert_eq!(outcomes.len(), 5);
    assert!(matches!(
        outcomes[1],
        Err(SimulationError::Config(ConfigError::DeadlinesUnsupported(_)))
    ));
    for (index, outcome) in outcomes.iter().enumerate() {
        if index != 1 {
            assert!(outcome.is_ok(), "job {} failed: {:?}", index, outcome);
        }
    }
}

#[test]
fn test_trial_index_changes_seed() {
    let job = experiment().jobs(&workload(), 0).remove(0);
    let other = job.with_trial(1);
    assert_ne!(job.seed().unwrap(), other.seed().unwrap());
    assert_eq!(job.seed().unwrap(), job.clone().seed().unwrap());
}

#[test]
fn test_policies_of_one_experiment_share_their_input() {
    let jobs = experiment().jobs(&workload(), 2);
    let first = jobs[0].input().unwrap();
    assert!(first.iter().flatten().all(|r| r.deadline.is_some()));
    for job in &jobs[1..] {
        assert_eq!(job.seed().unwrap(), jobs[0].seed().unwrap());
        assert_eq!(job.input().unwrap(), first, "{}", job.config.policy);
    }

    let mut other_model = jobs[1].clone();
    other_model.config.params.max_resources = 5;
    assert_eq!(other_model.input().unwrap(), first);
}

#[test]
fn test_trials_without_a_bound_are_not_combined() {
    let workload = Arc::new(Workload::new(vec![vec![
        ClassedRequest::new(Request::new(0, 0, 0.0, 1), 0),
        ClassedRequest::new(Request::new(1, 0, 0.0, 1), 0),
    ]]));
    let mut config = OrchestratorConfig::new(ModelParameters::default(), "pq(v)".parse().unwrap());
    config.estimator = EstimatorKind::Simple;
    let job = RunJob {
        label: "worthless".to_string(),
        config,
        workload,
        deadlines: None,
        trial: 0,
    };
    let combined = BatchRunner::new(2)
        .unwrap()
        .run_trials(&job, 3, Metric::ObjectiveFraction, CombineStrategy::Mean)
        .unwrap();
    assert_eq!(combined.trials, 3);
    assert_eq!(combined.combined, 0);
    assert_eq!(combined.value, None);
}

#[test]
fn test_trials_of_deterministic_input_agree() {
    let params = ModelParameters {
        max_resources: 2,
        ..ModelParameters::default()
    };
    let job = RunJob {
        label: "plain".to_string(),
        config: OrchestratorConfig::new(params, "pq(v)".parse().unwrap()),
        workload: workload(),
        deadlines: None,
        trial: 0,
    };
    let single = job.execute().unwrap();
    let combined = BatchRunner::new(2)
        .unwrap()
        .run_trials(&job, 5, Metric::Objective, CombineStrategy::Median)
        .unwrap();
    assert_eq!(combined.trials, 5);
    assert_eq!(combined.combined, 5);
    assert_eq!(combined.value, Some(single.snapshot.objective));
    assert_eq!(combined.policy, "pq(v)");
}

#[test]
fn test_trials_fail_together() {
    let mut job = experiment().jobs(&workload(), 0).remove(0);
    job.config.policy = "batch(2)".parse().unwrap();
    let runner = BatchRunner::new(2).unwrap();
    assert!(runner
        .run_trials(&job, 3, Metric::Objective, CombineStrategy::Mean)
        .is_err());
    assert!(runner
        .run_trials(&job, 0, Metric::Objective, CombineStrategy::Mean)
        .is_err());
}

#[test]
fn test_invalid_runner_settings() {
    assert!(matches!(BatchRunner::new(0), Err(ConfigError::InvalidBatch(_))));
    assert!("latency".parse::<Metric>().is_err());
    assert_eq!(
        "average-latency".parse::<Metric>().unwrap(),
        Metric::AverageLatency
    );
    assert_eq!("MEDIAN".parse::<CombineStrategy>().unwrap(), CombineStrategy::Median);
}

#[test]
fn test_derived_deadlines_reach_the_run() {
    let deadlines = DeadlineParameters::new(vec![0.0], 1.0, false);
    let params = ModelParameters::default();
    let workload = Arc::new(Workload::new(vec![vec![
        ClassedRequest::new(Request::new(0, 0, 5.0, 2), 0),
        ClassedRequest::new(Request::new(1, 0, 4.0, 2), 0),
    ]]));
    let job = RunJob {
        label: "tight".to_string(),
        config: OrchestratorConfig::new(params, "threshold".parse().unwrap()),
        workload,
        deadlines: Some(deadlines),
        trial: 0,
    };
    // zero cushion: only one of the two can meet its deadline
    let outcome = job.execute().unwrap();
    assert_eq!(outcome.snapshot.num_completed, 1);
    assert_eq!(outcome.snapshot.num_dropped, 1);
}
