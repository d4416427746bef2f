//! # PlantKeep Common Library
//!
//! Shared code for the PlantKeep crates:
//! - Plant record data model with tolerant ingestion of historical backups
//! - Backup export/import (JSON)
//! - Local inventory store
//! - Configuration loading and data folder resolution
//! - Common error type

pub mod backup;
pub mod config;
pub mod error;
pub mod plant;
pub mod store;

pub use error::{Error, Result};
pub use plant::{PlantRecord, PlantType, Rank};
