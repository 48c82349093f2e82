//! Statistics used by the event study.
//!
//! Descriptive statistics follow pandas/scipy conventions (sample standard
//! deviation, linearly interpolated quantiles, mstats winsorizing) so the
//! numbers line up with the published analysis.

pub mod descriptive;
pub mod hetero;
pub mod ols;

use thiserror::Error;

/// Errors raised by the regression code.
#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("Matrix is singular and cannot be inverted")]
    SingularMatrix,

    #[error("Need at least {needed} observations, got {got}")]
    InsufficientObservations { needed: usize, got: usize },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}
