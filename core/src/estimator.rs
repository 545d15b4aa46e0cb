//! OLS with cluster-robust (sandwich) covariance.
//!
//! V = (XᵀX)⁻¹ · c · M · (XᵀX)⁻¹, with the meat accumulated per cluster:
//! M = Σ_g (X_gᵀ e_g)(X_gᵀ e_g)ᵀ. Rows of one cluster are summed before
//! the outer product, so repeating rows within a cluster adds no
//! information.

use crate::{
    design::{DesignMatrix, GramFactor, Predictor},
    error::{StatError, StatResult},
    fit::{infer, student_t, variance_floor, CoefficientSummary, FitResult},
    panel::{Column, Level, Panel},
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Small-sample factor applied to the meat matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallSampleCorrection {
    /// G/(G−1) · (N−1)/(N−k).
    #[default]
    Conventional,
    /// G/(G−1).
    ClusterOnly,
    /// No adjustment (plain Liang–Zeger).
    None,
}

impl SmallSampleCorrection {
    pub fn factor(&self, clusters: usize, n_obs: usize, k: usize) -> f64 {
        let g = clusters as f64;
        let n = n_obs as f64;
        let k = k as f64;
        match self {
            Self::Conventional => (g / (g - 1.0)) * ((n - 1.0) / (n - k)),
            Self::ClusterOnly  => g / (g - 1.0),
            Self::None         => 1.0,
        }
    }
}

/// Degrees of freedom of the cluster-robust t reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterDf {
    /// G − 1.
    #[default]
    ClustersMinusOne,
    /// N − k, the OLS residual df.
    Residual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Relative pivot tolerance for declaring XᵀX singular.
    pub singular_tolerance: f64,
    pub correction:         SmallSampleCorrection,
    pub cluster_df:         ClusterDf,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            singular_tolerance: 1e-10,
            correction:         SmallSampleCorrection::default(),
            cluster_df:         ClusterDf::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterRobustEstimator {
    config: EstimatorConfig,
}

impl ClusterRobustEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Fit `outcome_column ~ 1 + predictors` and cluster on `cluster_column`.
    pub fn fit(
        &self,
        panel: &Panel,
        outcome_column: &str,
        predictor_columns: &[Predictor],
        cluster_column: &str,
    ) -> StatResult<FitResult> {
        let y = DVector::from_vec(panel.numeric_column(outcome_column.parse()?)?);
        let cluster_col: Column = cluster_column.parse()?;
        let cluster_levels = panel.categorical_column(cluster_col)?;
        let clusters = cluster_index(&cluster_levels);
        let design = DesignMatrix::build(panel, predictor_columns)?;

        let n = design.nrows();
        let k = design.ncols();
        let g = clusters.len();
        if g < 2 {
            return Err(StatError::InsufficientClusters { clusters: g });
        }
        if n <= k {
            return Err(StatError::InsufficientDegreesOfFreedom { observations: n, coefficients: k });
        }

        let x = &design.matrix;
        let factor = GramFactor::new(design.gram(), &design.column_names, self.config.singular_tolerance)?;
        let bread = factor.inverse();
        let beta = factor.solve(&(x.transpose() * &y));

        let fitted = x * &beta;
        let resid = &y - &fitted;
        let rss = resid.norm_squared();
        let y_mean = y.mean();
        let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
        let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };

        let residual_df = (n - k) as f64;
        let sigma2 = rss / residual_df;
        let naive_cov = &bread * sigma2;

        let meat = cluster_meat(x, &resid, clusters.values());
        let correction = self.config.correction.factor(g, n, k);
        let cluster_cov = &bread * (meat * correction) * &bread;

        let cluster_df = match self.config.cluster_df {
            ClusterDf::ClustersMinusOne => (g - 1) as f64,
            ClusterDf::Residual         => residual_df,
        };
        log::debug!(
            "fit: n={n} k={k} clusters={g} correction={correction:.6} df={cluster_df} rss={rss:.6}"
        );

        let cluster_t = student_t(cluster_df)?;
        let naive_t = student_t(residual_df)?;
        let tolerance = self.config.singular_tolerance;
        let cluster_floor = variance_floor(&cluster_cov, tolerance);
        let naive_floor = variance_floor(&naive_cov, tolerance);
        let summaries: Vec<CoefficientSummary> = design
            .column_names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let cluster = infer(beta[j], cluster_cov[(j, j)], cluster_floor, &cluster_t);
                if cluster.t_stat.is_nan() {
                    log::warn!("coefficient '{name}' has no cluster-robust variance; t and p undefined");
                }
                CoefficientSummary {
                    name:     name.clone(),
                    estimate: beta[j],
                    cluster,
                    naive:    infer(beta[j], naive_cov[(j, j)], naive_floor, &naive_t),
                }
            })
            .collect();

        Ok(FitResult {
            coefficient_names: design.column_names,
            coefficients:      beta.iter().copied().collect(),
            residuals:         resid.iter().copied().collect(),
            fitted:            fitted.iter().copied().collect(),
            cluster_cov,
            naive_cov,
            summaries,
            n_obs: n,
            n_clusters: g,
            rss,
            r_squared,
            correction,
            cluster_df,
            residual_df,
        })
    }
}

/// Fit with the default estimator configuration.
pub fn fit(
    panel: &Panel,
    outcome_column: &str,
    predictor_columns: &[Predictor],
    cluster_column: &str,
) -> StatResult<FitResult> {
    ClusterRobustEstimator::default().fit(panel, outcome_column, predictor_columns, cluster_column)
}

/// Row indices per cluster, keyed in level order.
fn cluster_index(levels: &[Level]) -> BTreeMap<&Level, Vec<usize>> {
    let mut index: BTreeMap<&Level, Vec<usize>> = BTreeMap::new();
    for (i, level) in levels.iter().enumerate() {
        index.entry(level).or_default().push(i);
    }
    index
}

/// M = Σ_g s_g s_gᵀ with score s_g = X_gᵀ e_g.
fn cluster_meat<'a>(
    x: &DMatrix<f64>,
    resid: &DVector<f64>,
    clusters: impl Iterator<Item = &'a Vec<usize>>,
) -> DMatrix<f64> {
    let k = x.ncols();
    let mut meat = DMatrix::zeros(k, k);
    for rows in clusters {
        let mut score = DVector::zeros(k);
        for &i in rows {
            score += x.row(i).transpose() * resid[i];
        }
        meat += &score * score.transpose();
    }
    meat
}
