//! Observation and taxon types shared by the pipeline stages
//!
//! These mirror the parts of the iNaturalist v1 JSON the pipeline reads.
//! Everything the service may omit is optional, and ids are normalized to
//! strings so they compare directly against inventory ids.

use chrono::NaiveDate;
use plantkeep_common::{PlantRecord, Rank};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Where to look for observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationFilter {
    /// Named iNaturalist place
    Place { id: u64 },
    /// Circle around a point
    Coordinates { lat: f64, lng: f64, radius_km: f64 },
}

impl LocationFilter {
    /// Place id, when filtering by named place
    ///
    /// Establishment means are place-scoped, so coordinate filters cannot be
    /// classified.
    pub fn place_id(&self) -> Option<u64> {
        match self {
            LocationFilter::Place { id } => Some(*id),
            LocationFilter::Coordinates { .. } => None,
        }
    }

    /// Query parameters appended to the observations request
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        match self {
            LocationFilter::Place { id } => vec![("place_id", id.to_string())],
            LocationFilter::Coordinates { lat, lng, radius_km } => vec![
                ("lat", lat.to_string()),
                ("lng", lng.to_string()),
                ("radius", radius_km.to_string()),
            ],
        }
    }
}

impl fmt::Display for LocationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationFilter::Place { id } => write!(f, "place {}", id),
            LocationFilter::Coordinates { lat, lng, radius_km } => {
                write!(f, "{},{} within {} km", lat, lng, radius_km)
            }
        }
    }
}

/// One external observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub taxon: Option<Taxon>,
    #[serde(default)]
    pub species_guess: Option<String>,
    #[serde(default)]
    pub place_guess: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub observed_on: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxon {
    #[serde(default)]
    pub id: Option<u64>,
    /// Scientific name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_common_name: Option<String>,
    #[serde(default)]
    pub introduced: Option<bool>,
    #[serde(default)]
    pub establishment_means: Option<EstablishmentMeansInfo>,
    #[serde(default)]
    pub wikipedia_summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstablishmentMeansInfo {
    #[serde(default)]
    pub establishment_means: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default)]
    pub url: String,
}

impl ObservationRecord {
    /// Scientific name, if present and non-empty
    pub fn scientific_name(&self) -> Option<&str> {
        self.taxon.as_ref().and_then(|t| non_empty(t.name.as_deref()))
    }

    pub fn preferred_common_name(&self) -> Option<&str> {
        self.taxon
            .as_ref()
            .and_then(|t| non_empty(t.preferred_common_name.as_deref()))
    }

    pub fn species_guess(&self) -> Option<&str> {
        non_empty(self.species_guess.as_deref())
    }

    pub fn place_guess(&self) -> Option<&str> {
        non_empty(self.place_guess.as_deref())
    }

    pub fn observed_on(&self) -> Option<&str> {
        non_empty(self.observed_on.as_deref())
    }

    pub fn taxon_id(&self) -> Option<u64> {
        self.taxon.as_ref().and_then(|t| t.id)
    }

    /// Parsed observation date; `None` when missing or unparseable
    pub fn observed_date(&self) -> Option<NaiveDate> {
        self.observed_on()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    /// First photo, upgraded from the square thumbnail to the medium size
    pub fn medium_image_url(&self) -> Option<String> {
        self.photos
            .first()
            .filter(|p| !p.url.is_empty())
            .map(|p| p.url.replacen("/square.", "/medium.", 1))
    }
}

/// How a species arrived in a region
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EstablishmentMeans {
    Native,
    Introduced,
    Naturalised,
    Invasive,
    Other(String),
}

impl EstablishmentMeans {
    /// Exact, case-sensitive match on the service's values
    pub fn parse(value: &str) -> Self {
        match value {
            "native" => EstablishmentMeans::Native,
            "introduced" => EstablishmentMeans::Introduced,
            "naturalised" => EstablishmentMeans::Naturalised,
            "invasive" => EstablishmentMeans::Invasive,
            other => EstablishmentMeans::Other(other.to_string()),
        }
    }

    /// Rank implied by establishment means alone
    pub fn rank(&self) -> Rank {
        match self {
            EstablishmentMeans::Invasive => Rank::A,
            EstablishmentMeans::Naturalised => Rank::C,
            EstablishmentMeans::Introduced => Rank::D,
            EstablishmentMeans::Native => Rank::Native,
            EstablishmentMeans::Other(_) => Rank::Unranked,
        }
    }

    pub fn is_invasive(&self) -> bool {
        matches!(self, EstablishmentMeans::Invasive)
    }

    pub fn as_str(&self) -> &str {
        match self {
            EstablishmentMeans::Native => "native",
            EstablishmentMeans::Introduced => "introduced",
            EstablishmentMeans::Naturalised => "naturalised",
            EstablishmentMeans::Invasive => "invasive",
            EstablishmentMeans::Other(s) => s,
        }
    }
}

impl fmt::Display for EstablishmentMeans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule paired an observation with an inventory record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Latin,
    Common,
    SpeciesGuess,
    None,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchType::Latin => "latin",
            MatchType::Common => "common",
            MatchType::SpeciesGuess => "species_guess",
            MatchType::None => "none",
        };
        f.write_str(label)
    }
}

/// Observation annotated with its inventory match
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedObservation {
    pub observation: ObservationRecord,
    pub matched_plant: Option<PlantRecord>,
    pub match_type: MatchType,
    pub can_update_existing: bool,
}

impl MatchedObservation {
    pub fn unmatched(observation: ObservationRecord) -> Self {
        Self {
            observation,
            matched_plant: None,
            match_type: MatchType::None,
            can_update_existing: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.observation.id
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected observation id, got {}",
            other
        ))),
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
