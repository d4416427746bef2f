//! Observation → plant record merging
//!
//! Builds candidate plants from observations, folds them into matched
//! inventory records, and classifies the genuinely new ones.
//!
//! **Merge Strategy:**
//! - Populated inventory fields are never overwritten or cleared
//! - Empty `latinName`, `imageUrl`, `type` are filled from the observation
//! - Locations and notes accumulate; observation ids are tracked
//!
//! **Classification (new plants only):**
//! - Establishment means give an initial rank and invasiveness
//! - A reference catalog entry for the latin name takes precedence

use crate::catalog::ReferenceCatalog;
use crate::matcher::match_catalog;
use crate::types::{EstablishmentMeans, ObservationRecord};
use chrono::{DateTime, Utc};
use plantkeep_common::plant::{generate_id, today_display};
use plantkeep_common::PlantRecord;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Location placeholder for observations without a place guess
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

const INVASIVE_NOTE: &str = "This plant is flagged as invasive in this area by iNaturalist.";

/// Build the plant record an observation would become
///
/// `None` when the observation carries no taxon.
pub fn candidate_plant(
    observation: &ObservationRecord,
    means: Option<&EstablishmentMeans>,
    now: DateTime<Utc>,
) -> Option<PlantRecord> {
    let taxon = observation.taxon.as_ref()?;
    let latin_name = observation.scientific_name().unwrap_or_default().to_string();

    let name = observation
        .species_guess()
        .or_else(|| observation.preferred_common_name())
        .or_else(|| observation.scientific_name())
        .unwrap_or_default()
        .to_string();

    let is_invasive = means.map(EstablishmentMeans::is_invasive).unwrap_or(false);

    Some(PlantRecord {
        id: generate_id(),
        external_id: Some(observation.id.clone()),
        name,
        latin_name,
        location: observation
            .place_guess()
            .unwrap_or(UNKNOWN_LOCATION)
            .to_string(),
        image_url: observation.medium_image_url().unwrap_or_default(),
        rank: means.map(EstablishmentMeans::rank).unwrap_or_default(),
        is_invasive,
        needs_removal: is_invasive,
        found: true,
        inat_notes: observation_notes(observation, taxon.wikipedia_summary.as_deref(), is_invasive),
        date_added: observation
            .observed_on()
            .map(str::to_string)
            .unwrap_or_else(today_display),
        last_updated_from_inat: Some(now),
        inat_observation_ids: vec![observation.id.clone()],
        ..Default::default()
    })
}

/// `"<summary> Imported from iNaturalist. Observed on <date>. <description>"`
pub fn observation_notes(
    observation: &ObservationRecord,
    summary: Option<&str>,
    is_invasive: bool,
) -> String {
    let mut notes = format!(
        "{} Imported from iNaturalist. Observed on {}. {}",
        summary.unwrap_or_default().trim(),
        observation.observed_on().unwrap_or("an unknown date"),
        observation.description.as_deref().unwrap_or_default().trim()
    )
    .trim()
    .to_string();

    if is_invasive {
        notes.push_str("\n\n");
        notes.push_str(INVASIVE_NOTE);
    }
    notes
}

/// Fold one observation into an existing record
///
/// Monotonic: no populated field of `existing` is cleared or replaced.
pub fn merge_update(
    existing: &PlantRecord,
    candidate: &PlantRecord,
    observation: &ObservationRecord,
    now: DateTime<Utc>,
) -> PlantRecord {
    let mut updated = existing.clone();

    if updated.latin_name.is_empty() && !candidate.latin_name.is_empty() {
        updated.latin_name = candidate.latin_name.clone();
    }
    if updated.image_url.is_empty() && !candidate.image_url.is_empty() {
        updated.image_url = candidate.image_url.clone();
    }
    if !updated.plant_type.is_specified() && candidate.plant_type.is_specified() {
        updated.plant_type = candidate.plant_type;
    }

    updated.found = true;

    let location = candidate.location.trim();
    if !location.is_empty() && location != UNKNOWN_LOCATION {
        if updated.location.trim().is_empty() {
            updated.location = location.to_string();
        } else if !updated.location.contains(location) {
            updated.location = format!("{}; {}", updated.location, location);
        }
    }

    let note = candidate.inat_notes.trim();
    if updated.inat_notes.trim().is_empty() {
        updated.inat_notes = note.to_string();
    } else if !already_noted(&updated.inat_notes, observation) && !note.is_empty() {
        updated.inat_notes = format!("{}\n\n{}", updated.inat_notes, note);
    }

    if !updated.references_observation(&observation.id) {
        updated.inat_observation_ids.push(observation.id.clone());
    }
    updated.last_updated_from_inat = Some(now);
    updated.is_matched = true;

    updated
}

/// Notes already carry an entry for this observation date
fn already_noted(notes: &str, observation: &ObservationRecord) -> bool {
    observation
        .observed_on()
        .map(|date| notes.contains(&format!("Observed on {}", date)))
        .unwrap_or(false)
}

/// Updated records, one per inventory id, in first-touched order
#[derive(Debug, Default)]
pub struct UpdateSet {
    records: Vec<PlantRecord>,
    index: HashMap<String, usize>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an observation into `existing`, or into its earlier update
    pub fn merge(
        &mut self,
        existing: &PlantRecord,
        candidate: &PlantRecord,
        observation: &ObservationRecord,
        now: DateTime<Utc>,
    ) {
        match self.index.get(&existing.id) {
            Some(&i) => {
                debug!(
                    plant_id = %existing.id,
                    observation_id = %observation.id,
                    "Folding observation into pending update"
                );
                self.records[i] = merge_update(&self.records[i], candidate, observation, now);
            }
            None => {
                self.index.insert(existing.id.clone(), self.records.len());
                self.records
                    .push(merge_update(existing, candidate, observation, now));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<PlantRecord> {
        self.records
    }
}

/// Classifies new plants against the reference catalog
pub struct RecordMerger {
    catalog: Arc<ReferenceCatalog>,
}

impl RecordMerger {
    pub fn new(catalog: Arc<ReferenceCatalog>) -> Self {
        Self { catalog }
    }

    /// Apply catalog precedence to a candidate with no inventory match
    pub fn classify_new(&self, mut plant: PlantRecord) -> PlantRecord {
        plant.is_matched = false;

        match match_catalog(&self.catalog, &plant) {
            Some(entry) => {
                if entry.rank.is_ranked() {
                    plant.rank = entry.rank;
                }
                if entry.plant_type.is_specified() {
                    plant.plant_type = entry.plant_type;
                }
                plant.is_invasive = entry.is_invasive.unwrap_or(false);
                plant.needs_removal = entry.needs_removal.unwrap_or(false);
                plant.is_document_matched = true;

                info!(
                    latin_name = %plant.latin_name,
                    rank = %plant.rank,
                    invasive = plant.is_invasive,
                    "New plant matched reference catalog"
                );
            }
            None => {
                plant.is_document_matched = false;
                debug!(latin_name = %plant.latin_name, "New plant not in reference catalog");
            }
        }

        plant
    }
}
