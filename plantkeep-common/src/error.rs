//! Common error types for PlantKeep

use thiserror::Error;

/// Common result type for PlantKeep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across PlantKeep crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or record content
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backup payload is not a JSON array of plant objects
    #[error("Invalid import data: {0}")]
    InvalidImportData(String),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),
}
