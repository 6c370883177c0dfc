use thiserror::Error;

/// Failures surfaced by the spectral initializer. None of them are retried internally.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InitError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "eigensolver did not converge after {iterations} iterations (relative residual {residual:.3e})"
    )]
    ConvergenceFailure { iterations: usize, residual: f64 },

    #[error("scale fit is degenerate: {0}")]
    DegenerateScale(String),
}

impl InitError {
    pub fn invalid(message: impl Into<String>) -> Self {
        InitError::InvalidArgument(message.into())
    }
}

pub type InitResult<T> = std::result::Result<T, InitError>;
