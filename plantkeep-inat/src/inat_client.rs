//! iNaturalist API client
//!
//! Fetches a user's plant observations, per-taxon establishment means for a
//! place, and the account/place autocomplete lookups used before an import.
//!
//! All outbound requests wait on a token-bucket rate limiter. Observation
//! fetches are cached by (user, location) until [`InatClient::refresh`] is
//! called; only non-empty results are reused.
//!
//! API Documentation: https://api.inaturalist.org/v1/docs/

use crate::error::{ImportError, ImportResult};
use crate::settings::InatSettings;
use crate::types::{EstablishmentMeans, LocationFilter, ObservationRecord, Taxon};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Observations requested per page (single page only)
pub const OBSERVATIONS_PER_PAGE: u32 = 100;

/// Source of external observations
///
/// Implemented by [`InatClient`]; the import coordinator only sees this trait.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Plant observations for `user`, filtered by location
    async fn fetch_observations(
        &self,
        user: &str,
        location: Option<&LocationFilter>,
    ) -> ImportResult<Vec<ObservationRecord>>;

    /// Establishment means of a taxon within a place, if the service knows it
    async fn establishment_means(
        &self,
        taxon_id: u64,
        place_id: u64,
    ) -> ImportResult<Option<EstablishmentMeans>>;

    /// Drop any cached observation results
    async fn refresh(&self) {}
}

/// Place returned by the place autocomplete search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub id: u64,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct ResultsPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, PartialEq)]
struct CacheKey {
    user: String,
    location: LocationFilter,
}

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// iNaturalist v1 API client
pub struct InatClient {
    client: Client,
    base_url: String,
    user_agent: String,
    rate_limiter: DirectRateLimiter,
    cache: Mutex<Option<(CacheKey, Vec<ObservationRecord>)>>,
}

impl InatClient {
    /// Create a client from resolved settings
    pub fn new(settings: &InatSettings, user_agent: String) -> ImportResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ImportError::FetchFailed(format!("HTTP client setup failed: {}", e)))?;

        let per_second =
            NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        info!(
            base_url = %settings.base_url,
            requests_per_second = per_second.get(),
            "iNaturalist client ready"
        );

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            user_agent,
            rate_limiter,
            cache: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that an iNaturalist account exists
    ///
    /// True iff the user autocomplete returns at least one result.
    pub async fn verify_user(&self, login: &str) -> ImportResult<bool> {
        let login = login.trim();
        if login.is_empty() {
            return Err(ImportError::MissingInput("user login".to_string()));
        }

        let page: ResultsPage<serde_json::Value> = self
            .get_json("users/autocomplete", &[("q", login.to_string())])
            .await?;

        debug!(login, matches = page.results.len(), "User autocomplete");
        Ok(!page.results.is_empty())
    }

    /// Search places by name
    pub async fn search_places(&self, query: &str) -> ImportResult<Vec<PlaceSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let page: ResultsPage<PlaceSummary> = self
            .get_json("places/autocomplete", &[("q", query.to_string())])
            .await?;
        Ok(page.results)
    }

    /// Invalidate the observation cache
    pub async fn refresh(&self) {
        *self.cache.lock().await = None;
        debug!("Observation cache cleared");
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ImportResult<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, ?query, "Querying iNaturalist API");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .query(query)
            .send()
            .await
            .map_err(|e| ImportError::FetchFailed(format!("iNaturalist request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::FetchFailed(format!(
                "iNaturalist returned HTTP {} for {}",
                status.as_u16(),
                path
            )));
        }

        response.json::<T>().await.map_err(|e| {
            ImportError::FetchFailed(format!("Failed to parse iNaturalist response: {}", e))
        })
    }
}

#[async_trait]
impl ObservationSource for InatClient {
    async fn fetch_observations(
        &self,
        user: &str,
        location: Option<&LocationFilter>,
    ) -> ImportResult<Vec<ObservationRecord>> {
        let user = user.trim();
        if user.is_empty() {
            return Err(ImportError::MissingInput("user login".to_string()));
        }
        let location =
            location.ok_or_else(|| ImportError::MissingInput("location filter".to_string()))?;

        let key = CacheKey {
            user: user.to_string(),
            location: location.clone(),
        };

        // Guard is not held across the request
        let cached = {
            let cache = self.cache.lock().await;
            cache
                .as_ref()
                .filter(|(cached_key, observations)| *cached_key == key && !observations.is_empty())
                .map(|(_, observations)| observations.clone())
        };
        if let Some(observations) = cached {
            debug!(user, %location, count = observations.len(), "Observation cache hit");
            return Ok(observations);
        }

        let mut query = vec![
            ("user_login", user.to_string()),
            ("per_page", OBSERVATIONS_PER_PAGE.to_string()),
            ("iconic_taxa", "Plantae".to_string()),
        ];
        query.extend(location.query_params());

        let page: ResultsPage<ObservationRecord> = self.get_json("observations", &query).await?;

        info!(user, %location, count = page.results.len(), "Fetched observations");
        *self.cache.lock().await = Some((key, page.results.clone()));
        Ok(page.results)
    }

    async fn establishment_means(
        &self,
        taxon_id: u64,
        place_id: u64,
    ) -> ImportResult<Option<EstablishmentMeans>> {
        let page: ResultsPage<Taxon> = self
            .get_json(
                &format!("taxa/{}", taxon_id),
                &[("place_id", place_id.to_string())],
            )
            .await?;

        let Some(taxon) = page.results.into_iter().next() else {
            warn!(taxon_id, place_id, "Taxon lookup returned no results");
            return Ok(None);
        };

        Ok(means_from_taxon(&taxon))
    }

    async fn refresh(&self) {
        InatClient::refresh(self).await;
    }
}

/// `introduced` wins over the explicit establishment means
fn means_from_taxon(taxon: &Taxon) -> Option<EstablishmentMeans> {
    if taxon.introduced == Some(true) {
        return Some(EstablishmentMeans::Introduced);
    }

    taxon
        .establishment_means
        .as_ref()
        .and_then(|info| info.establishment_means.as_deref())
        .filter(|s| !s.trim().is_empty())
        .map(EstablishmentMeans::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_means_prefers_introduced_flag() {
        let taxon: Taxon = serde_json::from_value(json!({
            "id": 1,
            "introduced": true,
            "establishment_means": {"establishment_means": "native"}
        }))
        .unwrap();
        assert_eq!(means_from_taxon(&taxon), Some(EstablishmentMeans::Introduced));
    }

    #[test]
    fn test_means_from_establishment_block() {
        let taxon: Taxon = serde_json::from_value(json!({
            "id": 1,
            "introduced": false,
            "establishment_means": {"establishment_means": "invasive"}
        }))
        .unwrap();
        assert_eq!(means_from_taxon(&taxon), Some(EstablishmentMeans::Invasive));
    }

    #[test]
    fn test_means_absent() {
        let taxon: Taxon = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(means_from_taxon(&taxon), None);

        let taxon: Taxon =
            serde_json::from_value(json!({"id": 1, "establishment_means": null})).unwrap();
        assert_eq!(means_from_taxon(&taxon), None);
    }

    #[test]
    fn test_client_creation() {
        let client = InatClient::new(&InatSettings::default(), "test-agent".to_string()).unwrap();
        assert_eq!(client.base_url(), "https://api.inaturalist.org/v1");
    }

    #[tokio::test]
    async fn test_missing_inputs_rejected_before_request() {
        let client = InatClient::new(&InatSettings::default(), "test-agent".to_string()).unwrap();

        let err = client
            .fetch_observations("  ", Some(&LocationFilter::Place { id: 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingInput(_)));

        let err = client.fetch_observations("alice", None).await.unwrap_err();
        assert!(matches!(err, ImportError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_empty_place_query_short_circuits() {
        let client = InatClient::new(&InatSettings::default(), "test-agent".to_string()).unwrap();
        assert!(client.search_places("").await.unwrap().is_empty());
    }
}
