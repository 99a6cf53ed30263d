//! Error types for compositors.

use hobart_data::DataError;
use hobart_factors::FactorError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for compositor operations.
pub type Result<T> = std::result::Result<T, CompositorError>;

/// Errors that can occur while updating derived series.
#[derive(Debug, Error)]
pub enum CompositorError {
    /// Store, calendar or frame error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Factor evaluation error
    #[error(transparent)]
    Factor(#[from] FactorError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Inputs of one entity are incomplete; the entity is skipped
    #[error("Incomplete data for {id}: {reason}")]
    IncompleteData {
        /// Entity that was skipped
        id: String,
        /// What was missing or inconsistent
        reason: String,
    },

    /// Cache file could not be read or written
    #[error("Cache file {path}: {source}")]
    CacheFile {
        /// Location of the cache file
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Cache file content is not a valid document
    #[error("Cache file encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl CompositorError {
    /// Whether the error must abort the whole run.
    ///
    /// Store and cache-file failures are fatal; everything else only affects the entity
    /// or date being processed.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Data(e) => e.is_store_failure(),
            Self::Factor(e) => e.is_store_failure(),
            Self::CacheFile { .. } | Self::Encoding(_) => true,
            Self::Polars(_) | Self::IncompleteData { .. } => false,
        }
    }

    /// Shorthand for [`CompositorError::IncompleteData`].
    pub fn incomplete(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IncompleteData {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
