//! Error types for factor evaluation.

use hobart_data::DataError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Result type for factor operations.
pub type Result<T> = std::result::Result<T, FactorError>;

/// Errors that can occur while evaluating factors.
#[derive(Debug, Error)]
pub enum FactorError {
    /// Store, calendar or frame error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// Query that cannot be evaluated
    #[error("Invalid factor query: {0}")]
    InvalidQuery(String),
}

impl FactorError {
    /// Whether the error comes from the backing store.
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::Data(e) if e.is_store_failure())
    }
}
