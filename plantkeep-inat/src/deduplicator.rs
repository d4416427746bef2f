//! Observation deduplication
//!
//! **Algorithm:**
//! 1. Drop observations the inventory already references (record `id`,
//!    `externalId`, or an entry of `iNatObservationIds`)
//! 2. Stable-sort by observation date, most recent first; undated
//!    observations sort last
//! 3. Keep the first observation per lowercase scientific name; observations
//!    without a scientific name are always kept

use crate::types::ObservationRecord;
use plantkeep_common::PlantRecord;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::debug;

/// Reduce fetched observations to the ones worth presenting for import
pub fn deduplicate(
    observations: Vec<ObservationRecord>,
    inventory: &[PlantRecord],
) -> Vec<ObservationRecord> {
    let fetched = observations.len();
    let known_ids = known_observation_ids(inventory);

    let mut remaining: Vec<ObservationRecord> = observations
        .into_iter()
        .filter(|obs| !known_ids.contains(obs.id.as_str()))
        .collect();
    let after_id_filter = remaining.len();

    // sort_by_key is stable, so equal dates keep fetch order
    remaining.sort_by_key(|obs| Reverse(obs.observed_date()));

    let mut seen_names = HashSet::new();
    let unique: Vec<ObservationRecord> = remaining
        .into_iter()
        .filter(|obs| match obs.scientific_name() {
            Some(name) => seen_names.insert(name.to_lowercase()),
            None => true,
        })
        .collect();

    debug!(
        fetched,
        already_imported = fetched - after_id_filter,
        same_species = after_id_filter - unique.len(),
        kept = unique.len(),
        "Deduplicated observations"
    );
    unique
}

fn known_observation_ids(inventory: &[PlantRecord]) -> HashSet<&str> {
    let mut ids = HashSet::new();
    for plant in inventory {
        ids.insert(plant.id.as_str());
        if let Some(external_id) = plant.external_id.as_deref() {
            ids.insert(external_id);
        }
        ids.extend(plant.inat_observation_ids.iter().map(String::as_str));
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Taxon;

    fn obs(id: &str, name: Option<&str>, observed_on: Option<&str>) -> ObservationRecord {
        ObservationRecord {
            id: id.to_string(),
            taxon: name.map(|n| Taxon {
                name: Some(n.to_string()),
                ..Default::default()
            }),
            observed_on: observed_on.map(str::to_string),
            ..Default::default()
        }
    }

    fn ids(observations: &[ObservationRecord]) -> Vec<&str> {
        observations.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_drops_ids_already_in_inventory() {
        let mut by_id = PlantRecord::new("Ivy");
        by_id.id = "1".to_string();
        let mut by_external = PlantRecord::new("Holly");
        by_external.external_id = Some("2".to_string());
        let mut by_history = PlantRecord::new("Broom");
        by_history.inat_observation_ids = vec!["3".to_string()];

        let result = deduplicate(
            vec![
                obs("1", Some("Hedera helix"), None),
                obs("2", Some("Ilex aquifolium"), None),
                obs("3", Some("Cytisus scoparius"), None),
                obs("4", Some("Acer macrophyllum"), None),
            ],
            &[by_id, by_external, by_history],
        );

        assert_eq!(ids(&result), vec!["4"]);
    }

    #[test]
    fn test_most_recent_per_species_wins() {
        let result = deduplicate(
            vec![
                obs("old", Some("Hedera helix"), Some("2023-05-01")),
                obs("new", Some("hedera HELIX"), Some("2024-02-10")),
                obs("other", Some("Ilex aquifolium"), Some("2022-01-01")),
            ],
            &[],
        );

        assert_eq!(ids(&result), vec!["new", "other"]);
    }

    #[test]
    fn test_nameless_observations_always_kept() {
        let result = deduplicate(
            vec![
                obs("a", None, Some("2024-01-01")),
                obs("b", None, Some("2024-01-01")),
                obs("c", Some(""), None),
            ],
            &[],
        );
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_undated_sorts_last_and_ties_keep_order() {
        let result = deduplicate(
            vec![
                obs("undated", Some("Hedera helix"), None),
                obs("bad-date", Some("Rubus armeniacus"), Some("yesterday")),
                obs("first", Some("Ilex aquifolium"), Some("2024-01-01")),
                obs("second", Some("Ilex aquifolium"), Some("2024-01-01")),
            ],
            &[],
        );

        assert_eq!(ids(&result), vec!["first", "undated", "bad-date"]);
    }

    #[test]
    fn test_never_increases_cardinality() {
        let input: Vec<ObservationRecord> = (0..20)
            .map(|i| {
                let name = format!("Species {}", i % 7);
                obs(&i.to_string(), Some(&name), Some("2024-03-01"))
            })
            .collect();

        let result = deduplicate(input.clone(), &[]);
        assert!(result.len() <= input.len());

        let mut names: Vec<String> = result
            .iter()
            .filter_map(|o| o.scientific_name())
            .map(str::to_lowercase)
            .collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 7);
    }
}
