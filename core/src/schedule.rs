//! Treatment schedules.
//!
//! A schedule decides, for a (group, period) pair, whether units of that
//! group are treated in that period. The simulator only calls the
//! schedule; it never knows the shape of the design.

use crate::types::Period;
use serde::{Deserialize, Serialize};

/// The contract every treatment schedule must fulfill.
///
/// Must be pure: the same (group, period) always yields the same value.
/// Valid return values are 0 (control) and 1 (treated); anything else is
/// rejected by the simulator.
pub trait Schedule: Sync {
    fn treatment(&self, group: &str, period: Period) -> i64;
}

impl<F> Schedule for F
where
    F: Fn(&str, Period) -> i64 + Sync,
{
    fn treatment(&self, group: &str, period: Period) -> i64 {
        self(group, period)
    }
}

/// One arm of a crossover design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleArm {
    pub group:           String,
    pub treated_periods: Vec<Period>,
}

/// Table-driven schedule. Groups without an arm are never treated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossoverSchedule {
    pub arms: Vec<ScheduleArm>,
}

impl CrossoverSchedule {
    pub fn new(arms: Vec<ScheduleArm>) -> Self {
        Self { arms }
    }

    /// Classic two-group crossover: `first` treated in `first_periods`,
    /// `second` treated in `second_periods`.
    pub fn two_group(
        first: &str,
        first_periods: &[Period],
        second: &str,
        second_periods: &[Period],
    ) -> Self {
        Self::new(vec![
            ScheduleArm { group: first.into(),  treated_periods: first_periods.to_vec() },
            ScheduleArm { group: second.into(), treated_periods: second_periods.to_vec() },
        ])
    }

    /// Groups named by this schedule, in arm order.
    pub fn groups(&self) -> Vec<String> {
        self.arms.iter().map(|a| a.group.clone()).collect()
    }
}

impl Default for CrossoverSchedule {
    /// A treated in periods 1–2, B treated in periods 3–4.
    fn default() -> Self {
        Self::two_group("A", &[1, 2], "B", &[3, 4])
    }
}

impl Schedule for CrossoverSchedule {
    fn treatment(&self, group: &str, period: Period) -> i64 {
        let treated = self
            .arms
            .iter()
            .any(|arm| arm.group == group && arm.treated_periods.contains(&period));
        i64::from(treated)
    }
}
