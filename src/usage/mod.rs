//! Accumulation of per-application usage. [accumulator::UsageAccumulator] owns the live table
//! and mirrors every counted second into a [crate::storage::UsageStore].

pub mod accumulator;
pub mod report;
pub mod rollup;
pub mod table;
