//! Report generation for event-study and heteroskedasticity runs.

pub mod charts;
pub mod generator;
