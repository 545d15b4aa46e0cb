//! trial-runner: headless driver for panel simulation and clustered fits.
//!
//! Usage:
//!   trial-runner --seed 1 --units 10 --periods 4
//!   trial-runner --config scenario.json --trials 500 --json

use anyhow::Result;
use panelstat_core::{
    config::ScenarioConfig,
    trials::{fit_treatment_model, run_trials, TrialSummary},
    ClusterRobustEstimator, FitResult, PanelSimulator,
};
use std::env;

#[derive(serde::Serialize)]
struct Report<'a> {
    scenario: &'a ScenarioConfig,
    fit:      &'a FitResult,
    trials:   Option<&'a TrialSummary>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let json = args.iter().any(|a| a == "--json");
    let mut scenario = match find_arg(&args, "--config") {
        Some(path) => ScenarioConfig::load(path)?,
        None => ScenarioConfig::default(),
    };
    scenario.seed = parse_arg(&args, "--seed", scenario.seed);
    scenario.trials = parse_arg(&args, "--trials", scenario.trials);
    scenario.simulator.num_units = parse_arg(&args, "--units", scenario.simulator.num_units);
    scenario.simulator.num_periods = parse_arg(&args, "--periods", scenario.simulator.num_periods);

    if !json {
        println!("panelstat trial-runner");
        println!("  seed:      {}", scenario.seed);
        println!("  units:     {}", scenario.simulator.num_units);
        println!("  periods:   {}", scenario.simulator.num_periods);
        println!("  groups:    {}", scenario.simulator.groups.join(", "));
        println!("  trials:    {}", scenario.trials);
        println!();
    }

    let simulator = PanelSimulator::new(scenario.simulator.clone())?;
    let panel = simulator.generate(&scenario.schedule, scenario.seed)?;
    let estimator = ClusterRobustEstimator::new(scenario.estimator.clone());
    let fit = fit_treatment_model(&estimator, &panel)?;
    log::debug!("fitted {} rows, {} treated", panel.len(), panel.treated_count());

    let trials = if scenario.trials > 0 {
        Some(run_trials(&scenario.trial_plan(), &scenario.schedule, scenario.seed)?)
    } else {
        None
    };

    if json {
        let report = Report { scenario: &scenario, fit: &fit, trials: trials.as_ref() };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_fit(&fit);
        if let Some(summary) = &trials {
            print_trials(summary);
        }
    }
    Ok(())
}

fn print_fit(fit: &FitResult) {
    println!("=== outcome ~ treatment_indicator + unit_id (clustered by unit) ===");
    println!("{fit}");
    if let Ok((lo, hi)) = fit.confidence_interval("treatment_indicator", 0.95) {
        println!("  treatment 95% CI (clustered): [{lo:.3}, {hi:.3}]");
    }
}

fn print_trials(s: &TrialSummary) {
    println!();
    println!("=== MONTE CARLO ({} trials) ===", s.n_trials);
    println!("  true effect:        {:.3}", s.true_effect);
    println!("  mean estimate:      {:.3}", s.mean_estimate);
    println!("  sd of estimates:    {:.3}", s.sd_estimate);
    println!("  mean se (cluster):  {:.3}", s.mean_cluster_se);
    println!("  mean se (naive):    {:.3}", s.mean_naive_se);
    println!("  cluster > naive:    {:.1}%", s.cluster_exceeds_naive * 100.0);
    println!("  rejection (cluster):{:.1}%", s.cluster_rejection * 100.0);
    println!("  rejection (naive):  {:.1}%", s.naive_rejection * 100.0);
}

fn find_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    find_arg(args, flag).and_then(|v| v.parse().ok()).unwrap_or(default)
}
