//! Reference catalog of documented plants
//!
//! Static lookup table keyed by lowercase latin name, used to backfill
//! classification for plants that match nothing in the inventory. The catalog
//! is loaded once and shared read-only; a default is bundled into the binary.

use plantkeep_common::{Error, PlantType, Rank, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

const BUNDLED_CATALOG: &str = include_str!("../data/reference_plants.json");

/// One documented plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntry {
    pub latin_name: String,
    /// Common name, informational only (never used for matching)
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub plant_type: PlantType,
    #[serde(default)]
    pub rank: Rank,
    #[serde(default)]
    pub is_invasive: Option<bool>,
    #[serde(default)]
    pub needs_removal: Option<bool>,
}

/// Immutable latin-name lookup over reference entries
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    entries: Vec<ReferenceEntry>,
    by_latin_name: HashMap<String, usize>,
}

impl ReferenceCatalog {
    /// Build a catalog; when latin names repeat, the first entry wins
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        let mut by_latin_name = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let key = entry.latin_name.trim().to_lowercase();
            if key.is_empty() {
                warn!(index, "Reference entry without latin name ignored");
                continue;
            }
            if by_latin_name.contains_key(&key) {
                debug!(latin_name = %entry.latin_name, "Duplicate reference entry ignored");
                continue;
            }
            by_latin_name.insert(key, index);
        }

        Self {
            entries,
            by_latin_name,
        }
    }

    /// Parse a catalog from a JSON array of entries
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<ReferenceEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    /// Catalog compiled into the binary
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CATALOG)
    }

    /// Load a catalog file, or the bundled one when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            let catalog = Self::bundled()?;
            info!(entries = catalog.len(), source = "bundled", "Reference catalog loaded");
            return Ok(catalog);
        };

        if !path.exists() {
            return Err(Error::NotFound(format!("catalog file {}", path.display())));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read catalog {} failed: {}", path.display(), e)))?;
        let catalog = Self::from_json(&content)?;

        info!(entries = catalog.len(), source = %path.display(), "Reference catalog loaded");
        Ok(catalog)
    }

    /// Case-insensitive lookup by latin name
    pub fn lookup(&self, latin_name: &str) -> Option<&ReferenceEntry> {
        let key = latin_name.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.by_latin_name.get(&key).map(|&index| &self.entries[index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_parses() {
        let catalog = ReferenceCatalog::bundled().unwrap();
        assert!(!catalog.is_empty());

        let ivy = catalog.lookup("hedera HELIX").unwrap();
        assert_eq!(ivy.rank, Rank::B);
        assert_eq!(ivy.is_invasive, Some(true));
    }

    #[test]
    fn test_lookup_misses() {
        let catalog = ReferenceCatalog::bundled().unwrap();
        assert!(catalog.lookup("Quercus garryana var. nonexistent").is_none());
        assert!(catalog.lookup("").is_none());
    }

    #[test]
    fn test_first_duplicate_wins() {
        let catalog = ReferenceCatalog::from_json(
            r#"[
                {"latinName": "Vinca minor", "rank": "C"},
                {"latinName": "vinca minor", "rank": "A"}
            ]"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup("Vinca minor").unwrap().rank, Rank::C);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, r#"[{"latinName": "Ilex aquifolium", "rank": "B"}]"#).unwrap();

        let catalog = ReferenceCatalog::load(Some(&path)).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup("ilex aquifolium").unwrap().rank, Rank::B);
        assert!(!ReferenceCatalog::load(None).unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_or_malformed_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.json");
        assert!(matches!(
            ReferenceCatalog::load(Some(&missing)),
            Err(Error::NotFound(_))
        ));

        let malformed = temp_dir.path().join("bad.json");
        std::fs::write(&malformed, "{not json").unwrap();
        assert!(matches!(
            ReferenceCatalog::load(Some(&malformed)),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_optional_flags_absent() {
        let catalog =
            ReferenceCatalog::from_json(r#"[{"latinName": "Buddleja davidii", "rank": "W"}]"#)
                .unwrap();
        let entry = catalog.lookup("Buddleja davidii").unwrap();
        assert_eq!(entry.is_invasive, None);
        assert_eq!(entry.plant_type, PlantType::Unspecified);
    }
}
