use thiserror::Error;

/// Failures raised by the reconciliation engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BalanceError {
    /// Absent or mismatched input, raised before any numeric work
    #[error("Invalid argument `{argument}`: {message}")]
    Validation {
        argument: &'static str,
        message: String,
    },

    /// The QP solver did not converge or the constraint set is infeasible
    #[error("Failed to solve balance task: {0}")]
    SolveFailed(String),

    /// The Global Test statistic came out as NaN or infinity
    #[error("Global test produced a non-finite statistic ({value})")]
    NonFiniteStatistic { value: f64 },
}

impl BalanceError {
    pub fn validation(argument: &'static str, message: impl Into<String>) -> Self {
        BalanceError::Validation {
            argument,
            message: message.into(),
        }
    }

    pub fn length_mismatch(argument: &'static str, expected: usize, actual: usize) -> Self {
        Self::validation(
            argument,
            format!("array length {actual} is not equal to the expected length {expected}"),
        )
    }

    /// Name of the offending argument for validation failures
    pub fn argument(&self) -> Option<&'static str> {
        match self {
            BalanceError::Validation { argument, .. } => Some(*argument),
            _ => None,
        }
    }
}

pub type BalanceResult<T> = Result<T, BalanceError>;
