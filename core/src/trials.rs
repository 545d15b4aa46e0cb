//! Monte Carlo studies: many independent generate + fit trials.
//!
//! Trials share nothing. Each owns a stream seeded from the SeedBank by
//! its index, so results do not depend on thread scheduling and trial k
//! is reproducible on its own.

use crate::{
    design::Predictor,
    error::{StatError, StatResult},
    estimator::{ClusterRobustEstimator, EstimatorConfig},
    fit::{student_t, FitResult},
    panel::Panel,
    rng::SeedBank,
    schedule::Schedule,
    simulator::{PanelSimulator, SimulatorConfig},
    types::Seed,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;

/// The treatment model used by trials:
/// outcome ~ treatment_indicator + unit fixed effects, clustered by unit.
pub const OUTCOME: &str = "outcome";
pub const TREATMENT: &str = "treatment_indicator";
pub const UNIT: &str = "unit_id";

pub fn treatment_model() -> Vec<Predictor> {
    vec![Predictor::numeric(TREATMENT), Predictor::categorical(UNIT)]
}

/// Fit the treatment model to one panel.
pub fn fit_treatment_model(estimator: &ClusterRobustEstimator, panel: &Panel) -> StatResult<FitResult> {
    estimator.fit(panel, OUTCOME, &treatment_model(), UNIT)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialPlan {
    pub simulator: SimulatorConfig,
    pub estimator: EstimatorConfig,
    pub n_trials:  usize,
    /// Significance level for the rejection-rate columns.
    pub alpha:     f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub index:      usize,
    pub seed:       Seed,
    pub estimate:   f64,
    pub cluster_se: f64,
    pub naive_se:   f64,
    pub cluster_df: f64,
    pub naive_df:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub n_trials:              usize,
    pub true_effect:           f64,
    pub mean_estimate:         f64,
    pub sd_estimate:           f64,
    pub mean_cluster_se:       f64,
    pub mean_naive_se:         f64,
    /// Share of trials where the cluster SE exceeds the naive SE.
    pub cluster_exceeds_naive: f64,
    /// Share of trials rejecting H0: β = true_effect at `alpha`.
    pub cluster_rejection:     f64,
    pub naive_rejection:       f64,
    pub outcomes:              Vec<TrialOutcome>,
}

pub fn run_trials<S: Schedule + ?Sized>(
    plan: &TrialPlan,
    schedule: &S,
    master_seed: Seed,
) -> StatResult<TrialSummary> {
    if plan.n_trials == 0 {
        return Err(StatError::config("n_trials must be >= 1"));
    }
    if !(plan.alpha > 0.0 && plan.alpha < 1.0) {
        return Err(StatError::config(format!("alpha must be in (0, 1), got {}", plan.alpha)));
    }
    let simulator = PanelSimulator::new(plan.simulator.clone())?;
    let estimator = ClusterRobustEstimator::new(plan.estimator.clone());
    let bank = SeedBank::new(master_seed);

    let outcomes = (0..plan.n_trials)
        .into_par_iter()
        .map(|index| {
            let mut rng = bank.stream(index as u64);
            let panel = simulator.generate_with_rng(schedule, &mut rng)?;
            let fit = fit_treatment_model(&estimator, &panel)?;
            let coef = fit
                .coefficient(TREATMENT)
                .ok_or_else(|| StatError::UnknownColumn { name: TREATMENT.into() })?;
            Ok(TrialOutcome {
                index,
                seed: rng.seed(),
                estimate: coef.estimate,
                cluster_se: coef.cluster.std_error,
                naive_se: coef.naive.std_error,
                cluster_df: fit.cluster_df(),
                naive_df: fit.residual_df(),
            })
        })
        .collect::<StatResult<Vec<_>>>()?;

    let summary = summarize(outcomes, plan.simulator.treatment_effect_mean, plan.alpha)?;
    log::info!(
        "trials={} mean_estimate={:.4} cluster>naive={:.3} reject(cluster)={:.3} reject(naive)={:.3}",
        summary.n_trials,
        summary.mean_estimate,
        summary.cluster_exceeds_naive,
        summary.cluster_rejection,
        summary.naive_rejection
    );
    Ok(summary)
}

fn summarize(outcomes: Vec<TrialOutcome>, true_effect: f64, alpha: f64) -> StatResult<TrialSummary> {
    let n = outcomes.len() as f64;
    let mean = |f: fn(&TrialOutcome) -> f64| outcomes.iter().map(f).sum::<f64>() / n;

    let mean_estimate = mean(|o| o.estimate);
    let var = if outcomes.len() > 1 {
        outcomes.iter().map(|o| (o.estimate - mean_estimate).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };

    let mut cluster_rejects = 0usize;
    let mut naive_rejects = 0usize;
    for o in &outcomes {
        if rejects(o.estimate - true_effect, o.cluster_se, o.cluster_df, alpha)? {
            cluster_rejects += 1;
        }
        if rejects(o.estimate - true_effect, o.naive_se, o.naive_df, alpha)? {
            naive_rejects += 1;
        }
    }

    Ok(TrialSummary {
        n_trials: outcomes.len(),
        true_effect,
        mean_estimate,
        sd_estimate: var.sqrt(),
        mean_cluster_se: mean(|o| o.cluster_se),
        mean_naive_se: mean(|o| o.naive_se),
        cluster_exceeds_naive: outcomes.iter().filter(|o| o.cluster_se > o.naive_se).count() as f64 / n,
        cluster_rejection: cluster_rejects as f64 / n,
        naive_rejection: naive_rejects as f64 / n,
        outcomes,
    })
}

fn rejects(deviation: f64, se: f64, df: f64, alpha: f64) -> StatResult<bool> {
    let t_crit = student_t(df)?.inverse_cdf(1.0 - alpha / 2.0);
    Ok((deviation / se).abs() > t_crit)
}
