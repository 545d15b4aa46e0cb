//! Fitted-model results.

use crate::error::{StatError, StatResult};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize, Serializer};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;

/// Inference for one coefficient under one covariance estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub std_error: f64,
    pub t_stat:    f64,
    pub p_value:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSummary {
    pub name:     String,
    pub estimate: f64,
    /// Cluster-robust inference.
    pub cluster:  Inference,
    /// Homoskedastic (naive OLS) inference.
    pub naive:    Inference,
}

/// The result of `ClusterRobustEstimator::fit`. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub(crate) coefficient_names: Vec<String>,
    pub(crate) coefficients:      Vec<f64>,
    pub(crate) residuals:         Vec<f64>,
    pub(crate) fitted:            Vec<f64>,
    #[serde(serialize_with = "serialize_rows")]
    pub(crate) cluster_cov:       DMatrix<f64>,
    #[serde(serialize_with = "serialize_rows")]
    pub(crate) naive_cov:         DMatrix<f64>,
    pub(crate) summaries:         Vec<CoefficientSummary>,
    pub(crate) n_obs:             usize,
    pub(crate) n_clusters:        usize,
    pub(crate) rss:               f64,
    pub(crate) r_squared:         f64,
    pub(crate) correction:        f64,
    pub(crate) cluster_df:        f64,
    pub(crate) residual_df:       f64,
}

impl FitResult {
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    /// Cluster-robust sandwich covariance (k×k).
    pub fn cluster_covariance(&self) -> &DMatrix<f64> {
        &self.cluster_cov
    }

    /// Homoskedastic covariance σ̂²(XᵀX)⁻¹ (k×k).
    pub fn naive_covariance(&self) -> &DMatrix<f64> {
        &self.naive_cov
    }

    pub fn summaries(&self) -> &[CoefficientSummary] {
        &self.summaries
    }

    pub fn coefficient(&self, name: &str) -> Option<&CoefficientSummary> {
        self.summaries.iter().find(|s| s.name == name)
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn n_coefficients(&self) -> usize {
        self.coefficients.len()
    }

    pub fn rss(&self) -> f64 {
        self.rss
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    /// Small-sample factor applied to the cluster meat.
    pub fn correction(&self) -> f64 {
        self.correction
    }

    /// Degrees of freedom of the cluster-robust reference distribution.
    pub fn cluster_df(&self) -> f64 {
        self.cluster_df
    }

    /// Degrees of freedom of the homoskedastic reference distribution (N−k).
    pub fn residual_df(&self) -> f64 {
        self.residual_df
    }

    /// Two-sided confidence interval from the cluster-robust covariance.
    pub fn confidence_interval(&self, name: &str, level: f64) -> StatResult<(f64, f64)> {
        if !(level > 0.0 && level < 1.0) {
            return Err(StatError::config(format!("confidence level must be in (0, 1), got {level}")));
        }
        let coef = self
            .coefficient(name)
            .ok_or_else(|| StatError::UnknownColumn { name: name.to_string() })?;
        let t_crit = student_t(self.cluster_df)?.inverse_cdf(0.5 + level / 2.0);
        let half = t_crit * coef.cluster.std_error;
        Ok((coef.estimate - half, coef.estimate + half))
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.coefficient_names.iter().map(String::len).max().unwrap_or(0).max(12);
        writeln!(
            f,
            "{:<width$} {:>10} {:>10} {:>8} {:>9} {:>10} {:>9}",
            "term", "estimate", "se(clust)", "t", "p", "se(naive)", "p(naive)"
        )?;
        for s in &self.summaries {
            writeln!(
                f,
                "{:<width$} {:>10.4} {:>10.4} {:>8.3} {:>9.4} {:>10.4} {:>9.4}",
                s.name,
                s.estimate,
                s.cluster.std_error,
                s.cluster.t_stat,
                s.cluster.p_value,
                s.naive.std_error,
                s.naive.p_value
            )?;
        }
        write!(
            f,
            "n={} clusters={} k={} R²={:.4} df(cluster)={} df(resid)={}",
            self.n_obs,
            self.n_clusters,
            self.n_coefficients(),
            self.r_squared,
            self.cluster_df,
            self.residual_df
        )
    }
}

pub(crate) fn student_t(df: f64) -> StatResult<StudentsT> {
    StudentsT::new(0.0, 1.0, df)
        .map_err(|e| StatError::config(format!("Student-t with {df} df: {e}")))
}

/// Variances at or below this are rounding noise, not information.
pub(crate) fn variance_floor(cov: &DMatrix<f64>, tolerance: f64) -> f64 {
    tolerance * cov.diagonal().iter().fold(0.0_f64, |m, &v| m.max(v))
}

/// Standard error, t-statistic and two-sided p-value for one coefficient.
/// A variance at or below `floor` is reported as a zero SE with t and p
/// undefined (NaN).
pub(crate) fn infer(estimate: f64, variance: f64, floor: f64, dist: &StudentsT) -> Inference {
    if !(variance > floor) {
        return Inference { std_error: 0.0, t_stat: f64::NAN, p_value: f64::NAN };
    }
    let std_error = variance.sqrt();
    let t_stat = estimate / std_error;
    let p_value = (2.0 * dist.sf(t_stat.abs())).clamp(0.0, 1.0);
    Inference { std_error, t_stat, p_value }
}

/// Row-major nested vectors, so reports read as plain k×k tables.
fn serialize_rows<S: Serializer>(m: &DMatrix<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    let rows: Vec<Vec<f64>> = m.row_iter().map(|r| r.iter().copied().collect()).collect();
    rows.serialize(serializer)
}
