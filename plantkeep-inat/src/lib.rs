//! # PlantKeep iNaturalist Import
//!
//! Reconciles a user's iNaturalist plant observations with the local
//! inventory:
//! - [`inat_client`]: observation, taxon, user and place lookups
//! - [`deduplicator`]: drops already-imported and same-species observations
//! - [`matcher`]: pairs observations with inventory records, candidate search
//! - [`merger`]: additive merging and new-plant classification
//! - [`coordinator`]: the end-to-end import run
//!
//! The inventory is passed in as a snapshot and results are returned to the
//! caller; nothing here writes to disk.

pub mod catalog;
pub mod coordinator;
pub mod deduplicator;
pub mod error;
pub mod inat_client;
pub mod matcher;
pub mod merger;
pub mod settings;
pub mod types;

pub use catalog::{ReferenceCatalog, ReferenceEntry};
pub use coordinator::{ImportCoordinator, ImportOutcome, ImportRequest};
pub use error::{ImportError, ImportResult, PartialImportError};
pub use inat_client::{InatClient, ObservationSource, PlaceSummary};
pub use matcher::filter_candidates;
pub use settings::InatSettings;
pub use types::{
    EstablishmentMeans, LocationFilter, MatchType, MatchedObservation, ObservationRecord,
};
