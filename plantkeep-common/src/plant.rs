//! Plant record data model
//!
//! The persisted inventory has gone through several schema shapes (`isEdible`,
//! `type` and `latinName` were added over time, and early records used numeric
//! ids). Every field is therefore optional on the way in and explicitly
//! defaulted, and unknown keys are carried through untouched so that a backup
//! can be restored and exported again without loss.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::{Error, Result};

/// Invasiveness severity code assigned to a plant
///
/// Serialized as its single-letter code, empty string when unranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Rank {
    /// N - native
    Native,
    A,
    B,
    C,
    D,
    /// W - watch list
    Watch,
    #[default]
    Unranked,
}

impl Rank {
    /// Single-letter code as stored in records
    pub fn code(self) -> &'static str {
        match self {
            Rank::Native => "N",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
            Rank::D => "D",
            Rank::Watch => "W",
            Rank::Unranked => "",
        }
    }

    /// Parse a rank code, looking only at the first character
    ///
    /// Documented ranks sometimes carry a suffix ("B - priority"), so only the
    /// leading letter is significant. Anything unrecognized is `Unranked`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('N') => Rank::Native,
            Some('A') => Rank::A,
            Some('B') => Rank::B,
            Some('C') => Rank::C,
            Some('D') => Rank::D,
            Some('W') => Rank::Watch,
            None => Rank::Unranked,
            Some(_) => {
                tracing::warn!(rank = %code, "Unrecognized rank code, treating as unranked");
                Rank::Unranked
            }
        }
    }

    pub fn is_ranked(self) -> bool {
        self != Rank::Unranked
    }
}

impl From<String> for Rank {
    fn from(code: String) -> Self {
        Rank::from_code(&code)
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.code().to_string()
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Growth habit of a plant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlantType {
    Tree,
    Shrub,
    Herbaceous,
    Aquatic,
    TreeShrub,
    #[default]
    Unspecified,
}

impl PlantType {
    pub fn label(self) -> &'static str {
        match self {
            PlantType::Tree => "Tree",
            PlantType::Shrub => "Shrub",
            PlantType::Herbaceous => "Herbaceous",
            PlantType::Aquatic => "Aquatic",
            PlantType::TreeShrub => "Tree/Shrub",
            PlantType::Unspecified => "",
        }
    }

    /// Case-insensitive parse; unknown labels become `Unspecified`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "tree" => PlantType::Tree,
            "shrub" => PlantType::Shrub,
            "herbaceous" => PlantType::Herbaceous,
            "aquatic" => PlantType::Aquatic,
            "tree/shrub" => PlantType::TreeShrub,
            "" => PlantType::Unspecified,
            other => {
                tracing::warn!(plant_type = %other, "Unrecognized plant type, leaving unspecified");
                PlantType::Unspecified
            }
        }
    }

    pub fn is_specified(self) -> bool {
        self != PlantType::Unspecified
    }
}

impl From<String> for PlantType {
    fn from(label: String) -> Self {
        PlantType::from_label(&label)
    }
}

impl From<PlantType> for String {
    fn from(plant_type: PlantType) -> Self {
        plant_type.label().to_string()
    }
}

impl fmt::Display for PlantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A plant known to the property owner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantRecord {
    /// Record id. Legacy records may hold timestamp-based or observation ids.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,

    /// Observation id this record was created from, if imported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Common name (required for persistence)
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,

    #[serde(default, deserialize_with = "nullable")]
    pub latin_name: String,

    /// Free text; may be a `"; "`-separated list of sub-locations
    #[serde(default, deserialize_with = "nullable")]
    pub location: String,

    #[serde(default, deserialize_with = "nullable")]
    pub image_url: String,

    #[serde(default, deserialize_with = "nullable")]
    pub rank: Rank,

    #[serde(default, rename = "type", deserialize_with = "nullable")]
    pub plant_type: PlantType,

    #[serde(default, deserialize_with = "nullable")]
    pub is_invasive: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub needs_removal: bool,

    /// Observed on the property
    #[serde(default, deserialize_with = "nullable")]
    pub found: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub is_edible: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub notes: String,

    /// Notes accumulated from observation imports
    #[serde(default, rename = "iNatNotes", deserialize_with = "nullable")]
    pub inat_notes: String,

    /// Display-formatted date string (M/D/YYYY or YYYY-MM-DD)
    #[serde(default, deserialize_with = "nullable")]
    pub date_added: String,

    #[serde(
        default,
        rename = "lastUpdatedFromINat",
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated_from_inat: Option<DateTime<Utc>>,

    /// Observation ids that contributed to this record
    #[serde(
        default,
        rename = "iNatObservationIds",
        deserialize_with = "nullable",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub inat_observation_ids: Vec<String>,

    /// Import output: paired with an existing inventory record
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "is_false")]
    pub is_matched: bool,

    /// Import output: paired with a reference catalog entry
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "is_false")]
    pub is_document_matched: bool,

    /// Keys this version does not know about, kept for lossless round-trips
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlantRecord {
    /// Create a record with a freshly generated id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Check persistence invariants
    ///
    /// `name` is always required. `location` was mandatory in earlier schema
    /// versions, so requiring it is left to configuration.
    pub fn validate(&self, require_location: bool) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "plant '{}' has no name",
                self.id
            )));
        }
        if require_location && self.location.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "plant '{}' ({}) has no location",
                self.id, self.name
            )));
        }
        Ok(())
    }

    /// True when this record already accounts for the given observation
    pub fn references_observation(&self, observation_id: &str) -> bool {
        self.id == observation_id
            || self.external_id.as_deref() == Some(observation_id)
            || self.inat_observation_ids.iter().any(|id| id == observation_id)
    }
}

/// Generate a new canonical record id
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Format a date the way `dateAdded` is displayed (M/D/YYYY)
pub fn display_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

/// Today's date in display format
pub fn today_display() -> String {
    display_date(chrono::Local::now().date_naive())
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Treat JSON `null` the same as a missing field
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Unparseable timestamps are dropped rather than failing the whole record
fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match DateTime::parse_from_rfc3339(&s) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(value = %s, error = %e, "Discarding unparseable lastUpdatedFromINat");
            None
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rank_codes() {
        assert_eq!(Rank::from_code("a"), Rank::A);
        assert_eq!(Rank::from_code("B - priority"), Rank::B);
        assert_eq!(Rank::from_code("N"), Rank::Native);
        assert_eq!(Rank::from_code("w"), Rank::Watch);
        assert_eq!(Rank::from_code(""), Rank::Unranked);
        assert_eq!(Rank::from_code("Z"), Rank::Unranked);
        assert_eq!(Rank::Unranked.code(), "");
    }

    #[test]
    fn test_plant_type_labels() {
        assert_eq!(PlantType::from_label("tree/shrub"), PlantType::TreeShrub);
        assert_eq!(PlantType::from_label(" Herbaceous "), PlantType::Herbaceous);
        assert_eq!(PlantType::from_label("vine"), PlantType::Unspecified);
        assert_eq!(PlantType::TreeShrub.to_string(), "Tree/Shrub");
    }

    #[test]
    fn test_legacy_record_with_numeric_id_and_missing_fields() {
        let plant: PlantRecord = serde_json::from_value(json!({
            "id": 1700000000000u64,
            "name": "Sword fern",
            "location": "North slope",
            "rank": "N",
            "found": true
        }))
        .unwrap();

        assert_eq!(plant.id, "1700000000000");
        assert_eq!(plant.rank, Rank::Native);
        assert_eq!(plant.plant_type, PlantType::Unspecified);
        assert!(plant.latin_name.is_empty());
        assert!(!plant.is_edible);
        assert!(plant.found);
    }

    #[test]
    fn test_nulls_default() {
        let plant: PlantRecord = serde_json::from_value(json!({
            "id": "x1",
            "name": "Ivy",
            "latinName": null,
            "type": null,
            "isInvasive": null,
            "iNatObservationIds": null
        }))
        .unwrap();

        assert!(plant.latin_name.is_empty());
        assert_eq!(plant.plant_type, PlantType::Unspecified);
        assert!(!plant.is_invasive);
        assert!(plant.inat_observation_ids.is_empty());
    }

    #[test]
    fn test_unknown_fields_survive_serialization() {
        let input = json!({
            "id": "abc",
            "name": "Oregon grape",
            "favorite": true,
            "plantedBy": "previous owner"
        });
        let plant: PlantRecord = serde_json::from_value(input).unwrap();
        assert_eq!(plant.extra.get("favorite"), Some(&json!(true)));

        let output = serde_json::to_value(&plant).unwrap();
        assert_eq!(output["plantedBy"], json!("previous owner"));
        assert_eq!(output["type"], json!(""));
        assert_eq!(output["iNatNotes"], json!(""));
    }

    #[test]
    fn test_bad_timestamp_is_discarded() {
        let plant: PlantRecord = serde_json::from_value(json!({
            "id": "a",
            "name": "Salal",
            "lastUpdatedFromINat": "yesterday"
        }))
        .unwrap();
        assert!(plant.last_updated_from_inat.is_none());
    }

    #[test]
    fn test_validate() {
        let mut plant = PlantRecord::new("Vine maple");
        assert!(plant.validate(false).is_ok());
        assert!(plant.validate(true).is_err());

        plant.location = "Creek".to_string();
        assert!(plant.validate(true).is_ok());

        plant.name = "  ".to_string();
        assert!(matches!(plant.validate(false), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_references_observation() {
        let mut plant = PlantRecord::new("Ivy");
        plant.external_id = Some("10".to_string());
        plant.inat_observation_ids = vec!["11".to_string()];

        assert!(plant.references_observation("10"));
        assert!(plant.references_observation("11"));
        assert!(!plant.references_observation("12"));
    }

    #[test]
    fn test_display_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(display_date(date), "3/7/2024");
    }
}
