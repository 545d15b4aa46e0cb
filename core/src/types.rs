//! Shared primitive types used across the library.

/// A unit (subject) identifier. Units are numbered from 1.
pub type UnitId = u32;

/// A time period within a panel. Periods are numbered 1..=T.
pub type Period = u32;

/// A group label, e.g. the crossover arm a unit belongs to.
pub type GroupLabel = String;

/// Seed for an explicit random stream.
pub type Seed = u64;
