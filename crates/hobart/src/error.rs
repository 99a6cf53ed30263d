//! Error types for the facade.

use hobart_compositor::CompositorError;
use hobart_data::DataError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, HobartError>;

/// Errors surfaced by configuration handling and pipeline runs.
#[derive(Debug, Error)]
pub enum HobartError {
    /// Config file could not be read or written
    #[error("Config file {path}: {source}")]
    Config {
        /// Location of the config file
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Config file is not a valid document
    #[error("Invalid config: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    /// Store or calendar error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Compositor failure
    #[error(transparent)]
    Compositor(#[from] CompositorError),
}
