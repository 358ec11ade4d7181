use thiserror::Error;

/// Errors raised by the manifold embedding estimators.
///
/// Numerical degeneracies inside an optimisation run (coincident points,
/// empty normalisation sums, a bandwidth search that runs out of
/// iterations) are absorbed locally and never surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManifoldError {
    #[error("Input matrix must have at least one sample and one feature")]
    EmptyInput,
    #[error("Input data contains NaN or infinite values")]
    NonFiniteInput,
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Insufficient data: need at least {min} samples, got {actual}")]
    InsufficientSamples { min: usize, actual: usize },
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Optimisation cancelled at iteration {iteration}")]
    Cancelled { iteration: usize },
}

pub type Result<T> = std::result::Result<T, ManifoldError>;
