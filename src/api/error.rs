use thiserror::Error;

use crate::core::SolveError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("Retirement age must be after current age")]
    RetirementNotAfterCurrentAge,
    #[error("Lifespan must be after retirement age")]
    LifespanNotAfterRetirement,
    #[error("--current-savings must be >= 0")]
    NegativeSavings,
    #[error("{field} must be between {min} and {max}")]
    AgeOutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{field} must be between 1 and {max}")]
    TrialCount { field: &'static str, max: u32 },
    #[error("maxIterations must be between 1 and {max}")]
    IterationCount { max: u32 },
    #[error("Invalid solver settings: {0}")]
    Solve(#[from] SolveError),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}
