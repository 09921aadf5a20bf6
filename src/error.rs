use thiserror::Error;

/// Result alias for the sampling core.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Failures surfaced by the sampling core and the statistics that feed it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Inputs are structurally unusable (no assets, missing asset columns, ragged tables).
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Weight normalization hit a zero or non-finite sum.
    #[error("Numeric degeneracy in {context}: normalization sum = {sum}")]
    NumericDegeneracy { context: String, sum: f64 },
}

impl SimulationError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn numeric_degeneracy(context: impl Into<String>, sum: f64) -> Self {
        Self::NumericDegeneracy {
            context: context.into(),
            sum,
        }
    }
}
