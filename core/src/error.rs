use crate::types::Period;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Invalid schedule: group '{group}' period {period} returned {value}, expected 0 or 1")]
    InvalidSchedule {
        group:  String,
        period: Period,
        value:  i64,
    },

    #[error("Singular design: column '{column}' is collinear with earlier columns")]
    SingularDesign { column: String },

    #[error("Insufficient clusters: need at least 2, got {clusters}")]
    InsufficientClusters { clusters: usize },

    #[error("Insufficient degrees of freedom: {observations} observations for {coefficients} coefficients")]
    InsufficientDegreesOfFreedom {
        observations: usize,
        coefficients: usize,
    },

    #[error("Column '{name}' not found")]
    UnknownColumn { name: String },

    #[error("Column '{name}' is not numeric")]
    NonNumericColumn { name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StatError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration { reason: reason.into() }
    }
}

pub type StatResult<T> = Result<T, StatError>;
