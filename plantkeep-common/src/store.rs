//! Local inventory store
//!
//! Keeps the inventory as a single JSON file (same layout as a backup) in the
//! data folder. The import pipeline never touches this module; callers load a
//! snapshot, run the pipeline, then apply its results here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::backup::parse_backup;
use crate::plant::PlantRecord;
use crate::Result;

/// Inventory file name inside the data folder
pub const INVENTORY_FILE_NAME: &str = "plants.json";

/// JSON-file backed inventory
#[derive(Debug, Clone)]
pub struct InventoryStore {
    path: PathBuf,
    require_location: bool,
}

/// Counts produced by [`apply_import`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub added: usize,
    pub updated: usize,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>, require_location: bool) -> Self {
        Self {
            path: path.into(),
            require_location,
        }
    }

    /// Store at `<data_folder>/plants.json`
    pub fn in_data_folder(data_folder: &Path, require_location: bool) -> Self {
        Self::new(data_folder.join(INVENTORY_FILE_NAME), require_location)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the inventory; a missing file is an empty inventory
    pub fn load(&self) -> Result<Vec<PlantRecord>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Inventory file missing, starting empty");
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_backup(&content)
    }

    /// Validate and write the inventory atomically (temp file + rename)
    pub fn save(&self, plants: &[PlantRecord]) -> Result<()> {
        for plant in plants {
            plant.validate(self.require_location)?;
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(plants)?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;

        info!(path = %self.path.display(), count = plants.len(), "Inventory saved");
        Ok(())
    }
}

/// Fold import results into an inventory
///
/// Updated records replace the inventory entry with the same id; new plants
/// are appended in order.
pub fn apply_import(
    inventory: &mut Vec<PlantRecord>,
    new_plants: Vec<PlantRecord>,
    updated_plants: Vec<PlantRecord>,
) -> ApplySummary {
    let mut summary = ApplySummary::default();

    let positions: HashMap<String, usize> = inventory
        .iter()
        .enumerate()
        .map(|(index, plant)| (plant.id.clone(), index))
        .collect();

    for updated in updated_plants {
        match positions.get(&updated.id) {
            Some(&index) => {
                inventory[index] = updated;
                summary.updated += 1;
            }
            None => {
                warn!(
                    id = %updated.id,
                    name = %updated.name,
                    "Updated plant not in inventory, adding it"
                );
                inventory.push(updated);
                summary.added += 1;
            }
        }
    }

    summary.added += new_plants.len();
    inventory.extend(new_plants);

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_import_replaces_and_appends() {
        let mut ivy = PlantRecord::new("Ivy");
        ivy.id = "1".to_string();
        let mut fern = PlantRecord::new("Fern");
        fern.id = "2".to_string();
        let mut inventory = vec![ivy.clone(), fern];

        let mut updated_ivy = ivy;
        updated_ivy.found = true;
        let holly = PlantRecord::new("Holly");

        let summary = apply_import(&mut inventory, vec![holly], vec![updated_ivy]);

        assert_eq!(summary, ApplySummary { added: 1, updated: 1 });
        assert_eq!(inventory.len(), 3);
        assert!(inventory[0].found);
        assert_eq!(inventory[1].name, "Fern");
        assert_eq!(inventory[2].name, "Holly");
    }
}
