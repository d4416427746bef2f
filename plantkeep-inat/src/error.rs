//! Error types for the observation import pipeline

use thiserror::Error;

/// Import pipeline error
#[derive(Debug, Error)]
pub enum ImportError {
    /// User login or location filter absent; nothing was attempted
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Observation service unreachable or returned a non-success status
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Import requested with zero selected observations
    #[error("No observations selected for import")]
    NoSelection,

    /// Reference catalog could not be loaded
    #[error("Common error: {0}")]
    Common(#[from] plantkeep_common::Error),
}

/// Result type for the import pipeline
pub type ImportResult<T> = Result<T, ImportError>;

/// Per-observation classification failure
///
/// Non-fatal: the observation is still imported with an empty rank and
/// non-invasive defaults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Lookup failed for observation {observation_id} (taxon {taxon_id}): {reason}")]
pub struct PartialImportError {
    pub observation_id: String,
    pub taxon_id: u64,
    pub reason: String,
}
