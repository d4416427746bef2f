//! Import orchestration
//!
//! **Pipeline:**
//! 1. Fetch observations for (user, location)
//! 2. Deduplicate against the inventory snapshot
//! 3. Match against inventory records
//! 4. Look up establishment means for unmatched, selected observations
//!    (bounded concurrency, per-lookup deadline, cancellable)
//! 5. Merge matched observations into updates; re-match and classify the rest
//!
//! The inventory is a read-only snapshot. Nothing is persisted here; the
//! caller applies the returned [`ImportOutcome`].

use crate::catalog::ReferenceCatalog;
use crate::deduplicator::deduplicate;
use crate::error::{ImportError, ImportResult, PartialImportError};
use crate::inat_client::ObservationSource;
use crate::matcher::MatchEngine;
use crate::merger::{candidate_plant, RecordMerger, UpdateSet};
use crate::settings::InatSettings;
use crate::types::{EstablishmentMeans, LocationFilter, MatchedObservation};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use plantkeep_common::PlantRecord;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to import
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub user: String,
    pub location: Option<LocationFilter>,
    /// Inventory snapshot; never modified
    pub inventory: Vec<PlantRecord>,
    /// Observation ids chosen for import
    pub selected: HashSet<String>,
}

/// Result of an import run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome {
    pub new_plants: Vec<PlantRecord>,
    pub updated_plants: Vec<PlantRecord>,
    /// Lookups that failed or timed out; those plants were imported unranked
    pub partial_failures: Vec<PartialImportError>,
    /// Run was cancelled; new plants still awaiting classification were dropped
    pub cancelled: bool,
}

impl ImportOutcome {
    fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Default::default()
        }
    }
}

enum Lookup {
    Resolved(Option<EstablishmentMeans>),
    Failed(String),
}

/// Drives the import pipeline over an observation source
pub struct ImportCoordinator<S: ObservationSource> {
    source: S,
    merger: RecordMerger,
    lookup_timeout: Duration,
    lookup_concurrency: usize,
}

impl<S: ObservationSource> ImportCoordinator<S> {
    pub fn new(source: S, catalog: Arc<ReferenceCatalog>, settings: &InatSettings) -> Self {
        Self {
            source,
            merger: RecordMerger::new(catalog),
            lookup_timeout: settings.lookup_timeout,
            lookup_concurrency: settings.lookup_concurrency.max(1),
        }
    }

    /// Build with the catalog at `catalog_path`, or the bundled one
    pub fn with_catalog_file(
        source: S,
        catalog_path: Option<&Path>,
        settings: &InatSettings,
    ) -> ImportResult<Self> {
        let catalog = ReferenceCatalog::load(catalog_path)?;
        Ok(Self::new(source, Arc::new(catalog), settings))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Forget cached observations so the next fetch hits the service
    pub async fn refresh(&self) {
        self.source.refresh().await;
    }

    /// Observations available for import, annotated with inventory matches
    pub async fn candidates(
        &self,
        user: &str,
        location: Option<&LocationFilter>,
        inventory: &[PlantRecord],
    ) -> ImportResult<Vec<MatchedObservation>> {
        let observations = self.source.fetch_observations(user, location).await?;
        let unique = deduplicate(observations, inventory);
        let matched = MatchEngine::new(inventory).match_observations(unique);

        info!(
            user,
            candidates = matched.len(),
            updates = matched.iter().filter(|m| m.can_update_existing).count(),
            "Import candidates ready"
        );
        Ok(matched)
    }

    /// Run an import for the selected observations
    ///
    /// # Errors
    /// - [`ImportError::NoSelection`] when nothing is selected (no request is made)
    /// - [`ImportError::MissingInput`] / [`ImportError::FetchFailed`] from the fetch
    ///
    /// Lookup failures do not fail the import; they are reported in
    /// [`ImportOutcome::partial_failures`].
    pub async fn import(
        &self,
        request: ImportRequest,
        cancel: &CancellationToken,
    ) -> ImportResult<ImportOutcome> {
        if request.selected.is_empty() {
            return Err(ImportError::NoSelection);
        }

        let candidates = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Import cancelled before observations were fetched");
                return Ok(ImportOutcome::cancelled());
            }
            result = self.candidates(
                &request.user,
                request.location.as_ref(),
                &request.inventory,
            ) => result?,
        };

        let selected: Vec<MatchedObservation> = candidates
            .into_iter()
            .filter(|m| request.selected.contains(m.id()))
            .filter(|m| {
                let has_taxon = m.observation.taxon.is_some();
                if !has_taxon {
                    debug!(observation_id = %m.id(), "Skipping observation without taxon");
                }
                has_taxon
            })
            .collect();

        if selected.len() < request.selected.len() {
            debug!(
                requested = request.selected.len(),
                importable = selected.len(),
                "Some selected observations are not importable"
            );
        }

        let now = Utc::now();
        let mut updates = UpdateSet::new();
        let mut unmatched = Vec::new();

        for matched in selected {
            if matched.can_update_existing {
                if let Some(existing) = &matched.matched_plant {
                    if let Some(candidate) = candidate_plant(&matched.observation, None, now) {
                        updates.merge(existing, &candidate, &matched.observation, now);
                    }
                    continue;
                }
            }
            unmatched.push(matched);
        }

        let place_id = request.location.as_ref().and_then(LocationFilter::place_id);
        let (lookups, cancelled) = match place_id {
            Some(place_id) => self.lookup_establishment_means(&unmatched, place_id, cancel).await,
            None => (HashMap::new(), false),
        };

        let engine = MatchEngine::new(&request.inventory);
        let mut new_plants = Vec::new();
        let mut partial_failures = Vec::new();

        for matched in &unmatched {
            let observation = &matched.observation;
            let taxon_id = observation.taxon_id();

            let means = match (place_id, taxon_id) {
                (Some(_), Some(taxon_id)) => match lookups.get(&taxon_id) {
                    Some(Lookup::Resolved(means)) => means.clone(),
                    Some(Lookup::Failed(reason)) => {
                        partial_failures.push(PartialImportError {
                            observation_id: observation.id.clone(),
                            taxon_id,
                            reason: reason.clone(),
                        });
                        None
                    }
                    // Classification never finished
                    None => continue,
                },
                _ => None,
            };

            let Some(candidate) = candidate_plant(observation, means.as_ref(), now) else {
                continue;
            };

            match engine.match_plant(&candidate) {
                Some(existing) => {
                    debug!(
                        observation_id = %observation.id,
                        plant_id = %existing.id,
                        "Constructed plant matched inventory, routing to update"
                    );
                    updates.merge(existing, &candidate, observation, now);
                }
                None => new_plants.push(self.merger.classify_new(candidate)),
            }
        }

        let outcome = ImportOutcome {
            new_plants,
            updated_plants: updates.into_records(),
            partial_failures,
            cancelled,
        };

        info!(
            new = outcome.new_plants.len(),
            updated = outcome.updated_plants.len(),
            partial_failures = outcome.partial_failures.len(),
            cancelled = outcome.cancelled,
            "Import complete"
        );
        Ok(outcome)
    }

    /// One lookup per distinct taxon; returns results and whether cancelled
    async fn lookup_establishment_means(
        &self,
        unmatched: &[MatchedObservation],
        place_id: u64,
        cancel: &CancellationToken,
    ) -> (HashMap<u64, Lookup>, bool) {
        let mut seen = HashSet::new();
        let taxon_ids: Vec<u64> = unmatched
            .iter()
            .filter_map(|m| m.observation.taxon_id())
            .filter(|id| seen.insert(*id))
            .collect();

        let mut results = HashMap::with_capacity(taxon_ids.len());
        if taxon_ids.is_empty() {
            return (results, false);
        }

        debug!(
            taxa = taxon_ids.len(),
            place_id,
            concurrency = self.lookup_concurrency,
            "Looking up establishment means"
        );

        let deadline = self.lookup_timeout;
        let mut lookups = stream::iter(taxon_ids)
            .map(|taxon_id| async move {
                let fetch = self.source.establishment_means(taxon_id, place_id);
                let result = tokio::time::timeout(deadline, fetch).await;
                let lookup = match result {
                    Ok(Ok(means)) => Lookup::Resolved(means),
                    Ok(Err(e)) => Lookup::Failed(e.to_string()),
                    Err(_) => Lookup::Failed(format!(
                        "lookup timed out after {} ms",
                        deadline.as_millis()
                    )),
                };
                (taxon_id, lookup)
            })
            .buffer_unordered(self.lookup_concurrency);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(
                        completed = results.len(),
                        "Import cancelled during establishment means lookups"
                    );
                    return (results, true);
                }
                next = lookups.next() => match next {
                    Some((taxon_id, lookup)) => {
                        if let Lookup::Failed(reason) = &lookup {
                            warn!(taxon_id, place_id, %reason, "Establishment means lookup failed");
                        }
                        results.insert(taxon_id, lookup);
                    }
                    None => return (results, false),
                },
            }
        }
    }
}
