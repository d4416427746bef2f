//! Inventory backup export and import
//!
//! A backup is the inventory serialized as a JSON array of plant records.
//! Importing validates the whole payload before returning anything, so a
//! malformed file never results in a partially restored inventory.

use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::plant::{generate_id, today_display, PlantRecord};
use crate::{Error, Result};

/// Serialize the inventory for a backup file
///
/// # Errors
/// `InvalidInput` when there is nothing to export.
pub fn export_json(plants: &[PlantRecord]) -> Result<String> {
    if plants.is_empty() {
        return Err(Error::InvalidInput("No plant data to export".to_string()));
    }
    Ok(serde_json::to_string_pretty(plants)?)
}

/// Backup file name for the given date: `plants-backup-YYYY-MM-DD.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("plants-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Write a dated backup file into `dir`, returning its path
pub fn write_backup(plants: &[PlantRecord], dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    let json = export_json(plants)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(backup_file_name(date));
    std::fs::write(&path, json)?;

    info!(path = %path.display(), count = plants.len(), "Backup written");
    Ok(path)
}

/// Parse a backup payload into plant records
///
/// Every entry is defaulted field by field. Entries without an id get a new
/// one; entries without `dateAdded` are stamped with today's date.
///
/// # Errors
/// `InvalidImportData` if the payload is not JSON, not an array, or contains
/// an entry that is not a plant object.
pub fn parse_backup(json: &str) -> Result<Vec<PlantRecord>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::InvalidImportData(format!("unparsable JSON: {}", e)))?;

    let Value::Array(entries) = value else {
        return Err(Error::InvalidImportData(
            "expected a JSON array of plants".to_string(),
        ));
    };

    let mut plants = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if !entry.is_object() {
            return Err(Error::InvalidImportData(format!(
                "entry {} is not an object",
                index
            )));
        }

        let mut plant: PlantRecord = serde_json::from_value(entry)
            .map_err(|e| Error::InvalidImportData(format!("entry {}: {}", index, e)))?;

        if plant.id.is_empty() {
            plant.id = generate_id();
            debug!(index, id = %plant.id, "Generated id for backup entry");
        }
        if plant.date_added.is_empty() {
            plant.date_added = today_display();
        }

        plants.push(plant);
    }

    Ok(plants)
}

/// Read and parse a backup file
pub fn read_backup(path: &Path) -> Result<Vec<PlantRecord>> {
    let content = std::fs::read_to_string(path)?;
    let plants = parse_backup(&content)?;
    info!(path = %path.display(), count = plants.len(), "Backup read");
    Ok(plants)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(backup_file_name(date), "plants-backup-2025-06-01.json");
    }

    #[test]
    fn test_export_empty_inventory_fails() {
        assert!(matches!(export_json(&[]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = parse_backup(r#"{"name": "Ivy"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidImportData(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_backup("not json at all").unwrap_err();
        assert!(matches!(err, Error::InvalidImportData(_)));
    }

    #[test]
    fn test_parse_rejects_non_object_entry() {
        let err = parse_backup(r#"[{"name": "Ivy"}, 42]"#).unwrap_err();
        match err {
            Error::InvalidImportData(msg) => assert!(msg.contains("entry 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_fills_missing_id_and_date() {
        let plants = parse_backup(r#"[{"name": "Camas"}]"#).unwrap();
        assert_eq!(plants.len(), 1);
        assert!(!plants[0].id.is_empty());
        assert!(!plants[0].date_added.is_empty());
    }
}
