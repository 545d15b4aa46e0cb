//! Panel simulation and cluster-robust inference for repeated-measures
//! experiments.
//!
//! Typical use: build a [`simulator::PanelSimulator`], generate a
//! [`panel::Panel`] under a [`schedule::Schedule`], then fit it with
//! [`estimator::ClusterRobustEstimator`], clustering on the unit.

pub mod config;
pub mod design;
pub mod error;
pub mod estimator;
pub mod fit;
pub mod panel;
pub mod rng;
pub mod schedule;
pub mod simulator;
pub mod trials;
pub mod types;

pub use design::Predictor;
pub use error::{StatError, StatResult};
pub use estimator::{fit, ClusterRobustEstimator, EstimatorConfig};
pub use fit::FitResult;
pub use panel::{Observation, Panel};
pub use schedule::{CrossoverSchedule, Schedule};
pub use simulator::{generate, PanelSimulator, SimulatorConfig};
