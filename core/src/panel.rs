//! Panel data: one observation per (unit, period).

use crate::{
    error::{StatError, StatResult},
    types::{GroupLabel, Period, UnitId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub unit_id:             UnitId,
    pub time_period:         Period,
    pub group:               GroupLabel,
    pub treatment_indicator: u8,
    pub outcome:             f64,
}

/// An ordered sequence of observations, unit-major then period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    observations: Vec<Observation>,
}

/// The named columns of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    UnitId,
    TimePeriod,
    Group,
    TreatmentIndicator,
    Outcome,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnitId             => "unit_id",
            Self::TimePeriod         => "time_period",
            Self::Group              => "group",
            Self::TreatmentIndicator => "treatment_indicator",
            Self::Outcome            => "outcome",
        }
    }
}

impl FromStr for Column {
    type Err = StatError;

    fn from_str(s: &str) -> StatResult<Self> {
        match s {
            "unit_id"             => Ok(Self::UnitId),
            "time_period"         => Ok(Self::TimePeriod),
            "group"               => Ok(Self::Group),
            "treatment_indicator" => Ok(Self::TreatmentIndicator),
            "outcome"             => Ok(Self::Outcome),
            other => Err(StatError::UnknownColumn { name: other.to_string() }),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One categorical value. Integer levels sort numerically, labels lexically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Int(i64),
    Label(String),
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v)   => write!(f, "{v}"),
            Self::Label(s) => f.write_str(s),
        }
    }
}

impl Panel {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Distinct unit ids, ascending.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        let ids: BTreeSet<UnitId> = self.iter().map(|o| o.unit_id).collect();
        ids.into_iter().collect()
    }

    pub fn num_units(&self) -> usize {
        self.unit_ids().len()
    }

    /// Largest period present (T for a complete panel).
    pub fn num_periods(&self) -> Period {
        self.iter().map(|o| o.time_period).max().unwrap_or(0)
    }

    /// Distinct group labels, sorted.
    pub fn groups(&self) -> Vec<GroupLabel> {
        let groups: BTreeSet<&str> = self.iter().map(|o| o.group.as_str()).collect();
        groups.into_iter().map(str::to_string).collect()
    }

    pub fn treated_count(&self) -> usize {
        self.iter().filter(|o| o.treatment_indicator == 1).count()
    }

    /// Observations belonging to one unit, in period order.
    pub fn unit(&self, unit_id: UnitId) -> impl Iterator<Item = &Observation> {
        self.iter().filter(move |o| o.unit_id == unit_id)
    }

    /// Read a column as numbers. The group column is not numeric.
    pub fn numeric_column(&self, column: Column) -> StatResult<Vec<f64>> {
        let value = |o: &Observation| -> Option<f64> {
            match column {
                Column::UnitId             => Some(f64::from(o.unit_id)),
                Column::TimePeriod         => Some(f64::from(o.time_period)),
                Column::TreatmentIndicator => Some(f64::from(o.treatment_indicator)),
                Column::Outcome            => Some(o.outcome),
                Column::Group              => None,
            }
        };
        self.iter()
            .map(|o| value(o).ok_or_else(|| StatError::NonNumericColumn { name: column.to_string() }))
            .collect()
    }

    /// Read a column as categorical levels, one per observation.
    pub fn categorical_column(&self, column: Column) -> StatResult<Vec<Level>> {
        self.iter()
            .map(|o| match column {
                Column::UnitId             => Ok(Level::Int(i64::from(o.unit_id))),
                Column::TimePeriod         => Ok(Level::Int(i64::from(o.time_period))),
                Column::TreatmentIndicator => Ok(Level::Int(i64::from(o.treatment_indicator))),
                Column::Group              => Ok(Level::Label(o.group.clone())),
                // Reals have no exact level identity.
                Column::Outcome => Err(StatError::config(
                    "outcome cannot be used as a categorical column",
                )),
            })
            .collect()
    }
}

impl FromIterator<Observation> for Panel {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
