use crate::{
    error::StatResult,
    estimator::EstimatorConfig,
    schedule::CrossoverSchedule,
    simulator::SimulatorConfig,
    trials::TrialPlan,
    types::Seed,
};
use serde::{Deserialize, Serialize};

/// A complete experiment: how to simulate, how to schedule treatment,
/// how to estimate, and how many Monte Carlo trials to run.
///
/// Every field is optional in JSON; missing fields take the two-group
/// crossover defaults (10 units, 4 periods, A treated 1–2, B treated 3–4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub simulator: SimulatorConfig,
    pub schedule:  CrossoverSchedule,
    pub estimator: EstimatorConfig,
    pub seed:      Seed,
    pub trials:    usize,
    pub alpha:     f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            schedule:  CrossoverSchedule::default(),
            estimator: EstimatorConfig::default(),
            seed:      1,
            trials:    0,
            alpha:     0.05,
        }
    }
}

impl ScenarioConfig {
    /// Load from a JSON file.
    pub fn load(path: &str) -> StatResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> StatResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.simulator.validate()?;
        Ok(config)
    }

    pub fn trial_plan(&self) -> TrialPlan {
        TrialPlan {
            simulator: self.simulator.clone(),
            estimator: self.estimator.clone(),
            n_trials:  self.trials,
            alpha:     self.alpha,
        }
    }
}
