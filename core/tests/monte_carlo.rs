//! Repeated-trial properties of the clustered estimator.

use panelstat_core::{
    config::ScenarioConfig,
    trials::{run_trials, TrialPlan},
    CrossoverSchedule, EstimatorConfig, SimulatorConfig, StatError,
};

fn plan(n_trials: usize) -> TrialPlan {
    TrialPlan {
        simulator: SimulatorConfig::default(),
        estimator: EstimatorConfig::default(),
        n_trials,
        alpha: 0.05,
    }
}

/// Serially correlated outcomes: the clustered SE on the treatment
/// coefficient should exceed the naive SE in the large majority of trials.
#[test]
fn clustered_se_usually_exceeds_naive_se() {
    let summary = run_trials(&plan(300), &CrossoverSchedule::default(), 2024).unwrap();

    assert_eq!(summary.n_trials, 300);
    assert_eq!(summary.outcomes.len(), 300);
    assert!(
        summary.cluster_exceeds_naive > 0.8,
        "cluster > naive in only {:.1}% of trials",
        summary.cluster_exceeds_naive * 100.0
    );
    assert!(summary.mean_cluster_se > summary.mean_naive_se);
}

#[test]
fn treatment_estimate_is_unbiased_across_trials() {
    let summary = run_trials(&plan(400), &CrossoverSchedule::default(), 7).unwrap();
    // SD of a single estimate is ≈ 1.3, so the mean of 400 is within ±0.3 easily.
    assert!(
        (summary.mean_estimate - 4.0).abs() < 0.3,
        "mean estimate {}",
        summary.mean_estimate
    );
    assert!(summary.sd_estimate > 0.0);
}

#[test]
fn trials_are_reproducible_and_ordered() {
    let a = run_trials(&plan(40), &CrossoverSchedule::default(), 99).unwrap();
    let b = run_trials(&plan(40), &CrossoverSchedule::default(), 99).unwrap();
    assert_eq!(a, b);
    assert!(a.outcomes.iter().enumerate().all(|(i, o)| o.index == i));
}

#[test]
fn trial_k_does_not_depend_on_trial_count() {
    let short = run_trials(&plan(5), &CrossoverSchedule::default(), 3).unwrap();
    let long = run_trials(&plan(50), &CrossoverSchedule::default(), 3).unwrap();
    assert_eq!(short.outcomes[..], long.outcomes[..5]);
}

#[test]
fn zero_trials_is_invalid() {
    assert!(matches!(
        run_trials(&plan(0), &CrossoverSchedule::default(), 1),
        Err(StatError::InvalidConfiguration { .. })
    ));
}

#[test]
fn scenario_config_drives_trials() {
    let config = ScenarioConfig::from_json_str(r#"{ "trials": 20, "seed": 5 }"#).unwrap();
    let summary = run_trials(&config.trial_plan(), &config.schedule, config.seed).unwrap();
    assert_eq!(summary.n_trials, 20);
    assert_eq!(summary.true_effect, 4.0);
    assert!((0.0..=1.0).contains(&summary.cluster_rejection));
    assert!((0.0..=1.0).contains(&summary.naive_rejection));
}
