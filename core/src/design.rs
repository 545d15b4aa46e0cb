//! Design-matrix construction with reference coding.

use crate::{
    error::{StatError, StatResult},
    panel::{Column, Level, Panel},
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const INTERCEPT: &str = "(Intercept)";

/// A right-hand-side term of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "column", rename_all = "snake_case")]
pub enum Predictor {
    /// Enters the model as its numeric value.
    Numeric(String),
    /// Expands to one indicator per level, first level omitted.
    Categorical(String),
}

impl Predictor {
    pub fn numeric(column: &str) -> Self {
        Self::Numeric(column.to_string())
    }

    pub fn categorical(column: &str) -> Self {
        Self::Categorical(column.to_string())
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Numeric(c) | Self::Categorical(c) => c,
        }
    }
}

/// Dense n×k design matrix with named columns. The first column is
/// always the intercept.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub matrix:       DMatrix<f64>,
    pub column_names: Vec<String>,
}

impl DesignMatrix {
    pub fn build(panel: &Panel, predictors: &[Predictor]) -> StatResult<Self> {
        let n = panel.len();
        let mut columns: Vec<Vec<f64>> = vec![vec![1.0; n]];
        let mut column_names = vec![INTERCEPT.to_string()];

        for predictor in predictors {
            let column: Column = predictor.column().parse()?;
            match predictor {
                Predictor::Numeric(_) => {
                    columns.push(panel.numeric_column(column)?);
                    column_names.push(column.to_string());
                }
                Predictor::Categorical(_) => {
                    let values = panel.categorical_column(column)?;
                    let levels: BTreeSet<&Level> = values.iter().collect();
                    // First (lowest) level is the reference and gets no column.
                    for level in levels.into_iter().skip(1) {
                        columns.push(
                            values.iter().map(|v| if v == level { 1.0 } else { 0.0 }).collect(),
                        );
                        column_names.push(format!("{column}[{level}]"));
                    }
                }
            }
        }

        let k = columns.len();
        let matrix = DMatrix::from_fn(n, k, |i, j| columns[j][i]);
        log::debug!("design matrix: n={n} k={k}");
        Ok(Self { matrix, column_names })
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Cross-product XᵀX.
    pub fn gram(&self) -> DMatrix<f64> {
        self.matrix.transpose() * &self.matrix
    }

    /// Full column rank within `tolerance`, judged by the Cholesky pivots
    /// of XᵀX.
    pub fn is_full_rank(&self, tolerance: f64) -> bool {
        GramFactor::new(self.gram(), &self.column_names, tolerance).is_ok()
    }
}

/// Cholesky factor of XᵀX, with a relative pivot check.
pub(crate) struct GramFactor {
    chol: nalgebra::Cholesky<f64, nalgebra::Dyn>,
}

impl GramFactor {
    /// Fails with SingularDesign when any pivot L_jj² falls below
    /// `tolerance · (XᵀX)_jj`, naming the first offending column.
    pub(crate) fn new(gram: DMatrix<f64>, names: &[String], tolerance: f64) -> StatResult<Self> {
        let diag = gram.diagonal();
        let singular = |j: usize| StatError::SingularDesign {
            column: names.get(j).cloned().unwrap_or_else(|| format!("#{j}")),
        };

        if let Some(j) = diag.iter().position(|&d| d <= 0.0) {
            return Err(singular(j));
        }

        let Some(chol) = nalgebra::Cholesky::new(gram.clone()) else {
            // Smallest leading block that fails to factor names the column.
            let k = diag.len();
            let j = (0..k)
                .find(|&j| {
                    nalgebra::Cholesky::new(gram.view((0, 0), (j + 1, j + 1)).into_owned()).is_none()
                })
                .unwrap_or(k - 1);
            return Err(singular(j));
        };

        let l = chol.l_dirty();
        for j in 0..diag.len() {
            let pivot = l[(j, j)];
            if !(pivot * pivot > tolerance * diag[j]) {
                return Err(singular(j));
            }
        }
        Ok(Self { chol })
    }

    pub(crate) fn solve(&self, rhs: &DVector<f64>) -> DVector<f64> {
        self.chol.solve(rhs)
    }

    pub(crate) fn inverse(&self) -> DMatrix<f64> {
        self.chol.inverse()
    }
}
