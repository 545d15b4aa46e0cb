//! Cluster-robust estimation: hand-checked values, failure modes, and the
//! two-group crossover scenario.

use panelstat_core::{
    design::{DesignMatrix, INTERCEPT},
    estimator::{ClusterDf, SmallSampleCorrection},
    ClusterRobustEstimator, CrossoverSchedule, EstimatorConfig, Observation, Panel,
    PanelSimulator, Predictor, SimulatorConfig, StatError,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn obs(unit_id: u32, time_period: u32, group: &str, treated: u8, outcome: f64) -> Observation {
    Observation {
        unit_id,
        time_period,
        group: group.into(),
        treatment_indicator: treated,
        outcome,
    }
}

fn treatment_model() -> Vec<Predictor> {
    vec![Predictor::numeric("treatment_indicator"), Predictor::categorical("unit_id")]
}

fn crossover_panel(seed: u64) -> Panel {
    PanelSimulator::new(SimulatorConfig::default())
        .unwrap()
        .generate(&CrossoverSchedule::default(), seed)
        .unwrap()
}

/// Intercept-only model on two clusters, checked by hand:
/// y = [1, 3, 2, 6], ȳ = 3, e = [-2, 0, -1, 3].
/// Cluster scores: -2 and 2, meat = 8, (XᵀX)⁻¹ = 1/4, correction = G/(G−1) = 2.
/// V = 8 · 2 / 16 = 1. Naive: RSS = 14, σ² = 14/3, V = 14/12.
#[test]
fn intercept_only_matches_hand_computation() {
    init_logger();
    let panel = Panel::new(vec![
        obs(1, 1, "A", 0, 1.0),
        obs(1, 2, "A", 0, 3.0),
        obs(2, 1, "B", 0, 2.0),
        obs(2, 2, "B", 0, 6.0),
    ]);
    let fit = panelstat_core::fit(&panel, "outcome", &[], "unit_id").unwrap();

    let c = fit.coefficient(INTERCEPT).unwrap();
    assert!((c.estimate - 3.0).abs() < 1e-12);
    assert!((c.cluster.std_error - 1.0).abs() < 1e-12, "se={}", c.cluster.std_error);
    assert!((c.naive.std_error - (14.0_f64 / 12.0).sqrt()).abs() < 1e-12);
    assert!((fit.correction() - 2.0).abs() < 1e-12);
    assert_eq!(fit.cluster_df(), 1.0);
    assert_eq!(fit.residual_df(), 3.0);
    // t(1) is Cauchy: p = 2·(1/2 − atan(3)/π).
    let expected_p = 2.0 * (0.5 - 3.0_f64.atan() / std::f64::consts::PI);
    assert!((c.cluster.p_value - expected_p).abs() < 1e-6, "p={}", c.cluster.p_value);
    assert!((fit.rss() - 14.0).abs() < 1e-12);
}

#[test]
fn residuals_and_fitted_values_reconstruct_outcome() {
    let panel = crossover_panel(5);
    let fit = ClusterRobustEstimator::default()
        .fit(&panel, "outcome", &treatment_model(), "unit_id")
        .unwrap();
    for ((o, e), yhat) in panel.iter().zip(fit.residuals()).zip(fit.fitted_values()) {
        assert!((o.outcome - (yhat + e)).abs() < 1e-9);
    }
    // OLS residuals are orthogonal to the intercept.
    let sum: f64 = fit.residuals().iter().sum();
    assert!(sum.abs() < 1e-8, "Σe={sum}");
}

#[test]
fn single_cluster_is_insufficient() {
    let panel = crossover_panel(3);
    // Keep group A only, then cluster on group.
    let one_group: Panel = panel.iter().filter(|o| o.group == "A").cloned().collect();
    let result = panelstat_core::fit(
        &one_group,
        "outcome",
        &[Predictor::numeric("treatment_indicator")],
        "group",
    );
    assert!(matches!(result, Err(StatError::InsufficientClusters { clusters: 1 })));
}

#[test]
fn duplicated_indicator_is_singular() {
    let panel = crossover_panel(4);
    let result = panelstat_core::fit(
        &panel,
        "outcome",
        &[Predictor::numeric("treatment_indicator"), Predictor::numeric("treatment_indicator")],
        "unit_id",
    );
    match result {
        Err(StatError::SingularDesign { column }) => assert_eq!(column, "treatment_indicator"),
        other => panic!("expected SingularDesign, got {other:?}"),
    }
}

#[test]
fn group_nested_in_unit_fixed_effects_is_singular() {
    // Group is constant within unit, so its indicator is a sum of unit indicators.
    let panel = crossover_panel(4);
    let result = panelstat_core::fit(
        &panel,
        "outcome",
        &[Predictor::categorical("unit_id"), Predictor::categorical("group")],
        "unit_id",
    );
    assert!(matches!(result, Err(StatError::SingularDesign { .. })));
}

#[test]
fn reference_level_omission_keeps_full_rank() {
    let panel = crossover_panel(8);
    let design = DesignMatrix::build(&panel, &treatment_model()).unwrap();
    // 10 unit levels → 9 indicators, plus intercept and treatment.
    assert_eq!(design.ncols(), 1 + 1 + 9);
    let unit_columns = design.column_names.iter().filter(|n| n.starts_with("unit_id[")).count();
    assert_eq!(unit_columns, 9);
    assert!(design.is_full_rank(1e-10));
}

#[test]
fn unknown_columns_are_reported() {
    let panel = crossover_panel(1);
    assert!(matches!(
        panelstat_core::fit(&panel, "score", &[], "unit_id"),
        Err(StatError::UnknownColumn { .. })
    ));
    assert!(matches!(
        panelstat_core::fit(&panel, "outcome", &[], "school"),
        Err(StatError::UnknownColumn { .. })
    ));
    assert!(matches!(
        panelstat_core::fit(&panel, "group", &[], "unit_id"),
        Err(StatError::NonNumericColumn { .. })
    ));
}

#[test]
fn saturated_model_has_no_degrees_of_freedom() {
    let panel = Panel::new(vec![obs(1, 1, "A", 1, 5.0), obs(2, 1, "B", 0, 3.0)]);
    let result = panelstat_core::fit(&panel, "outcome", &[Predictor::numeric("treatment_indicator")], "unit_id");
    assert!(matches!(
        result,
        Err(StatError::InsufficientDegreesOfFreedom { observations: 2, coefficients: 2 })
    ));
}

#[test]
fn singleton_clusters_are_valid() {
    // One row per unit: every cluster has size 1.
    let panel = Panel::new(
        (1..=6)
            .map(|u| obs(u, 1, "A", u8::from(u % 2 == 0), f64::from(u) * 1.5 + f64::from(u % 3)))
            .collect(),
    );
    let fit = panelstat_core::fit(&panel, "outcome", &[Predictor::numeric("treatment_indicator")], "unit_id")
        .unwrap();
    assert_eq!(fit.n_clusters(), 6);
    assert!(fit.coefficient("treatment_indicator").unwrap().cluster.std_error > 0.0);
}

#[test]
fn correction_policies_scale_covariance() {
    let panel = crossover_panel(12);
    let fit_with = |correction| {
        ClusterRobustEstimator::new(EstimatorConfig { correction, ..EstimatorConfig::default() })
            .fit(&panel, "outcome", &treatment_model(), "unit_id")
            .unwrap()
    };
    let conventional = fit_with(SmallSampleCorrection::Conventional);
    let none = fit_with(SmallSampleCorrection::None);

    let n = 40.0;
    let k = 11.0;
    let g = 10.0;
    let factor = (g / (g - 1.0)) * ((n - 1.0) / (n - k));
    let ratio = conventional.cluster_covariance()[(1, 1)] / none.cluster_covariance()[(1, 1)];
    assert!((ratio - factor).abs() < 1e-9, "ratio={ratio} factor={factor}");
    assert_eq!(conventional.coefficients(), none.coefficients());
}

#[test]
fn residual_df_policy_changes_reference_distribution() {
    let panel = crossover_panel(12);
    let est = ClusterRobustEstimator::new(EstimatorConfig {
        cluster_df: ClusterDf::Residual,
        ..EstimatorConfig::default()
    });
    let fit = est.fit(&panel, "outcome", &treatment_model(), "unit_id").unwrap();
    assert_eq!(fit.cluster_df(), 29.0);

    let default_fit = panelstat_core::fit(&panel, "outcome", &treatment_model(), "unit_id").unwrap();
    assert_eq!(default_fit.cluster_df(), 9.0);
    let a = fit.coefficient("treatment_indicator").unwrap().cluster;
    let b = default_fit.coefficient("treatment_indicator").unwrap().cluster;
    assert_eq!(a.std_error, b.std_error);
    assert!(a.p_value <= b.p_value);
}

#[test]
fn naive_covariance_is_sigma_squared_bread() {
    let panel = crossover_panel(2);
    let fit = panelstat_core::fit(&panel, "outcome", &treatment_model(), "unit_id").unwrap();
    let design = DesignMatrix::build(&panel, &treatment_model()).unwrap();
    let bread = design.gram().try_inverse().unwrap();
    let sigma2 = fit.rss() / fit.residual_df();
    let diff = (fit.naive_covariance() - bread * sigma2).abs().max();
    assert!(diff < 1e-8, "max diff {diff}");
}

/// Two-group crossover, seed 1: treatment recovered near 4 and the
/// clustered SE exceeds the homoskedastic one.
#[test]
fn crossover_scenario_recovers_treatment_effect() {
    init_logger();
    let panel = panelstat_core::generate(
        10,
        4,
        &CrossoverSchedule::two_group("A", &[1, 2], "B", &[3, 4]),
        60.0,
        5.0,
        3.0,
        2.0,
        4.0,
        3.0,
        1,
    )
    .unwrap();
    let fit = panelstat_core::fit(&panel, "outcome", &treatment_model(), "unit_id").unwrap();

    let t = fit.coefficient("treatment_indicator").unwrap();
    // Seed-1 draw; stays within about 0.5 SD of the true effect 4.
    assert!((t.estimate - 4.6447).abs() < 1e-3, "estimate={}", t.estimate);
    assert!(
        t.cluster.std_error > t.naive.std_error,
        "cluster se {} <= naive se {}",
        t.cluster.std_error,
        t.naive.std_error
    );
    assert_eq!(fit.n_obs(), 40);
    assert_eq!(fit.n_clusters(), 10);
    assert_eq!(fit.n_coefficients(), 11);

    let (lo, hi) = fit.confidence_interval("treatment_indicator", 0.95).unwrap();
    assert!(lo < t.estimate && t.estimate < hi);
    let table = fit.to_string();
    assert!(table.contains("treatment_indicator"));
    assert!(table.contains("unit_id[10]"));
}

#[test]
fn confidence_interval_rejects_bad_level() {
    let panel = crossover_panel(2);
    let fit = panelstat_core::fit(&panel, "outcome", &treatment_model(), "unit_id").unwrap();
    assert!(fit.confidence_interval("treatment_indicator", 1.5).is_err());
    assert!(fit.confidence_interval("dose", 0.9).is_err());
}

/// Unit indicators are absorbed by clustering on the same unit, so their
/// cluster variance is rounding noise. Their t and p must be undefined,
/// never a huge finite t with p = 0.
#[test]
fn unit_fixed_effects_have_undefined_cluster_t() {
    let panel = crossover_panel(1);
    let fit = panelstat_core::fit(&panel, "outcome", &treatment_model(), "unit_id").unwrap();

    let unit_terms: Vec<_> = fit.summaries().iter().filter(|s| s.name.starts_with("unit_id[")).collect();
    assert_eq!(unit_terms.len(), 9);
    for s in unit_terms {
        assert!(
            !s.cluster.t_stat.is_finite(),
            "{}: cluster t={} se={}",
            s.name,
            s.cluster.t_stat,
            s.cluster.std_error
        );
        assert!(s.cluster.p_value.is_nan());
        assert!(s.naive.t_stat.is_finite(), "{} naive t", s.name);
    }

    let t = fit.coefficient("treatment_indicator").unwrap();
    assert!(t.cluster.t_stat.is_finite());
    assert!((0.0..=1.0).contains(&t.cluster.p_value));
}

#[test]
fn json_report_carries_both_covariances() {
    let panel = crossover_panel(1);
    let fit = panelstat_core::fit(&panel, "outcome", &treatment_model(), "unit_id").unwrap();
    let value = serde_json::to_value(&fit).unwrap();

    for key in ["cluster_cov", "naive_cov"] {
        let rows = value[key].as_array().unwrap_or_else(|| panic!("{key} missing"));
        assert_eq!(rows.len(), 11, "{key} rows");
        assert!(rows.iter().all(|r| r.as_array().map(Vec::len) == Some(11)), "{key} cols");
    }
    let treatment_var = value["cluster_cov"][1][1].as_f64().unwrap();
    assert!((treatment_var - fit.cluster_covariance()[(1, 1)]).abs() < 1e-12);
    let naive_var = value["naive_cov"][1][1].as_f64().unwrap();
    assert!((naive_var - fit.naive_covariance()[(1, 1)]).abs() < 1e-12);
}
