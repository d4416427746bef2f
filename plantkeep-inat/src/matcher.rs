//! Inventory and reference-catalog matching
//!
//! Observations match inventory records in priority order:
//! 1. scientific name == record `latinName` → [`MatchType::Latin`]
//! 2. preferred common name == record `name` → [`MatchType::Common`]
//! 3. species guess == record `name` → [`MatchType::SpeciesGuess`]
//!
//! All comparisons are case-insensitive. When several records share a key,
//! the last one in inventory order wins.

use crate::catalog::{ReferenceCatalog, ReferenceEntry};
use crate::types::{MatchType, MatchedObservation, ObservationRecord};
use plantkeep_common::PlantRecord;
use std::collections::HashMap;
use tracing::debug;

/// Lookup tables over an inventory snapshot
pub struct MatchEngine<'a> {
    by_latin_name: HashMap<String, &'a PlantRecord>,
    by_name: HashMap<String, &'a PlantRecord>,
}

impl<'a> MatchEngine<'a> {
    pub fn new(inventory: &'a [PlantRecord]) -> Self {
        let mut by_latin_name = HashMap::new();
        let mut by_name = HashMap::new();

        for plant in inventory {
            if !plant.latin_name.is_empty() {
                by_latin_name.insert(plant.latin_name.to_lowercase(), plant);
            }
            if !plant.name.is_empty() {
                by_name.insert(plant.name.to_lowercase(), plant);
            }
        }

        Self {
            by_latin_name,
            by_name,
        }
    }

    fn latin(&self, key: Option<&str>) -> Option<&'a PlantRecord> {
        key.and_then(|k| self.by_latin_name.get(&k.to_lowercase()).copied())
    }

    fn named(&self, key: Option<&str>) -> Option<&'a PlantRecord> {
        key.and_then(|k| self.by_name.get(&k.to_lowercase()).copied())
    }

    /// Find the inventory record an observation refers to
    pub fn match_observation(&self, observation: ObservationRecord) -> MatchedObservation {
        let found = self
            .latin(observation.scientific_name())
            .map(|p| (p, MatchType::Latin))
            .or_else(|| {
                self.named(observation.preferred_common_name())
                    .map(|p| (p, MatchType::Common))
            })
            .or_else(|| {
                self.named(observation.species_guess())
                    .map(|p| (p, MatchType::SpeciesGuess))
            });

        match found {
            Some((plant, match_type)) => {
                debug!(
                    observation_id = %observation.id,
                    plant_id = %plant.id,
                    %match_type,
                    "Observation matched inventory"
                );
                MatchedObservation {
                    observation,
                    matched_plant: Some(plant.clone()),
                    match_type,
                    can_update_existing: true,
                }
            }
            None => MatchedObservation::unmatched(observation),
        }
    }

    pub fn match_observations(
        &self,
        observations: Vec<ObservationRecord>,
    ) -> Vec<MatchedObservation> {
        observations
            .into_iter()
            .map(|obs| self.match_observation(obs))
            .collect()
    }

    /// Match a constructed plant by latin name, then by name
    pub fn match_plant(&self, plant: &PlantRecord) -> Option<&'a PlantRecord> {
        let latin = Some(plant.latin_name.as_str()).filter(|s| !s.is_empty());
        let name = Some(plant.name.as_str()).filter(|s| !s.is_empty());
        self.latin(latin).or_else(|| self.named(name))
    }
}

/// Catalog entry for a plant, by latin name only
pub fn match_catalog<'c>(
    catalog: &'c ReferenceCatalog,
    plant: &PlantRecord,
) -> Option<&'c ReferenceEntry> {
    if plant.latin_name.is_empty() {
        return None;
    }
    catalog.lookup(&plant.latin_name)
}

/// Narrow candidates to those containing `term`
///
/// Case-insensitive substring search over the common name (preferred
/// common name, else species guess), latin name, place guess, observed
/// date and description. A blank term keeps everything.
pub fn filter_candidates(candidates: &[MatchedObservation], term: &str) -> Vec<MatchedObservation> {
    if term.trim().is_empty() {
        return candidates.to_vec();
    }
    let term = term.to_lowercase();
    let contains = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&term));

    candidates
        .iter()
        .filter(|candidate| {
            let obs = &candidate.observation;
            contains(obs.preferred_common_name().or_else(|| obs.species_guess()))
                || contains(obs.scientific_name())
                || contains(obs.place_guess())
                || contains(obs.observed_on())
                || contains(obs.description.as_deref())
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Taxon;

    fn plant(id: &str, name: &str, latin: &str) -> PlantRecord {
        PlantRecord {
            id: id.to_string(),
            name: name.to_string(),
            latin_name: latin.to_string(),
            ..Default::default()
        }
    }

    fn observation(
        latin: Option<&str>,
        common: Option<&str>,
        guess: Option<&str>,
    ) -> ObservationRecord {
        ObservationRecord {
            id: "obs-1".to_string(),
            taxon: Some(Taxon {
                id: Some(10),
                name: latin.map(str::to_string),
                preferred_common_name: common.map(str::to_string),
                ..Default::default()
            }),
            species_guess: guess.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_latin_match_wins_over_common_names() {
        let inventory = vec![
            plant("1", "Ivy", "Hedera helix"),
            plant("2", "Common Ivy", ""),
        ];
        let engine = MatchEngine::new(&inventory);

        let matched = engine.match_observation(observation(
            Some("HEDERA HELIX"),
            Some("common ivy"),
            Some("Something else"),
        ));

        assert_eq!(matched.match_type, MatchType::Latin);
        assert!(matched.can_update_existing);
        assert_eq!(matched.matched_plant.unwrap().id, "1");
    }

    #[test]
    fn test_common_then_species_guess() {
        let inventory = vec![plant("1", "English Holly", ""), plant("2", "Broom", "")];
        let engine = MatchEngine::new(&inventory);

        let common = engine.match_observation(observation(
            Some("Ilex aquifolium"),
            Some("english holly"),
            Some("broom"),
        ));
        assert_eq!(common.match_type, MatchType::Common);
        assert_eq!(common.matched_plant.unwrap().id, "1");

        let guess =
            engine.match_observation(observation(Some("Cytisus scoparius"), None, Some("BROOM")));
        assert_eq!(guess.match_type, MatchType::SpeciesGuess);
        assert_eq!(guess.matched_plant.unwrap().id, "2");
    }

    #[test]
    fn test_unmatched() {
        let inventory = vec![plant("1", "Ivy", "Hedera helix")];
        let engine = MatchEngine::new(&inventory);

        let matched = engine.match_observation(observation(Some("Acer macrophyllum"), None, None));
        assert_eq!(matched.match_type, MatchType::None);
        assert!(!matched.can_update_existing);
        assert!(matched.matched_plant.is_none());
    }

    #[test]
    fn test_last_record_wins_for_shared_key() {
        let inventory = vec![
            plant("first", "Ivy", "Hedera helix"),
            plant("second", "Ivy by the shed", "hedera helix"),
        ];
        let engine = MatchEngine::new(&inventory);

        let matched = engine.match_observation(observation(Some("Hedera helix"), None, None));
        assert_eq!(matched.matched_plant.unwrap().id, "second");
    }

    #[test]
    fn test_match_plant_latin_then_name() {
        let inventory = vec![
            plant("1", "Salal", "Gaultheria shallon"),
            plant("2", "Rubus armeniacus", ""),
        ];
        let engine = MatchEngine::new(&inventory);

        let by_latin = plant("x", "Other", "gaultheria SHALLON");
        assert_eq!(engine.match_plant(&by_latin).unwrap().id, "1");

        let by_name = plant("y", "Rubus armeniacus", "Rubus armeniacus");
        assert_eq!(engine.match_plant(&by_name).unwrap().id, "2");

        assert!(engine.match_plant(&plant("z", "", "")).is_none());
    }

    #[test]
    fn test_catalog_match_is_latin_only() {
        let catalog = ReferenceCatalog::bundled().unwrap();

        let ivy = plant("x", "Whatever", "Hedera helix");
        assert!(match_catalog(&catalog, &ivy).is_some());

        let by_common_only = plant("y", "English ivy", "");
        assert!(match_catalog(&catalog, &by_common_only).is_none());
    }

    fn searchable(id: &str, common: Option<&str>, guess: Option<&str>) -> MatchedObservation {
        let mut obs = observation(Some("Hedera helix"), common, guess);
        obs.id = id.to_string();
        obs.place_guess = Some("Front yard".to_string());
        obs.observed_on = Some("2024-01-01".to_string());
        obs.description = Some("Climbing the fence".to_string());
        MatchedObservation::unmatched(obs)
    }

    fn ids(candidates: &[MatchedObservation]) -> Vec<&str> {
        candidates.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn test_filter_blank_term_keeps_all() {
        let candidates = vec![searchable("1", None, None), searchable("2", None, None)];
        assert_eq!(filter_candidates(&candidates, "").len(), 2);
        assert_eq!(filter_candidates(&candidates, "   ").len(), 2);
    }

    #[test]
    fn test_filter_common_name_prefers_taxon_name() {
        let candidates = vec![
            searchable("1", Some("common ivy"), Some("Garden vine")),
            searchable("2", None, Some("Garden vine")),
        ];
        assert_eq!(ids(&filter_candidates(&candidates, "COMMON IVY")), vec!["1"]);
        // Species guess is only searched when there is no preferred common name
        assert_eq!(ids(&filter_candidates(&candidates, "garden")), vec!["2"]);
    }

    #[test]
    fn test_filter_latin_place_date_description() {
        let mut other = searchable("2", None, None);
        other.observation.taxon = None;
        other.observation.place_guess = Some("Back yard".to_string());
        other.observation.observed_on = Some("2023-06-15".to_string());
        other.observation.description = None;
        let candidates = vec![searchable("1", None, None), other];

        assert_eq!(ids(&filter_candidates(&candidates, "hedera")), vec!["1"]);
        assert_eq!(ids(&filter_candidates(&candidates, "front")), vec!["1"]);
        assert_eq!(ids(&filter_candidates(&candidates, "back yard")), vec!["2"]);
        assert_eq!(ids(&filter_candidates(&candidates, "2023-06")), vec!["2"]);
        assert_eq!(ids(&filter_candidates(&candidates, "fence")), vec!["1"]);
        assert!(filter_candidates(&candidates, "salal").is_empty());
    }
}
