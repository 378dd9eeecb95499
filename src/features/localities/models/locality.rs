use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Rung of the territorial hierarchy a locality occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "administrative_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdministrativeType {
    Department,
    Province,
    District,
    City,
    PopulatedPlace,
    Town,
    Locality,
}

impl AdministrativeType {
    /// Rank used for hierarchy bonuses and tie-breaking. Unknown types rank 0.
    pub fn level_rank(kind: Option<AdministrativeType>) -> u32 {
        match kind {
            Some(AdministrativeType::Department) => 7,
            Some(AdministrativeType::Province) => 6,
            Some(AdministrativeType::District) => 5,
            Some(AdministrativeType::City) => 4,
            Some(AdministrativeType::PopulatedPlace) => 3,
            Some(AdministrativeType::Town) => 2,
            Some(AdministrativeType::Locality) => 1,
            None => 0,
        }
    }

    /// True for types that sit below district level
    pub fn is_below_district(&self) -> bool {
        matches!(
            self,
            AdministrativeType::City
                | AdministrativeType::PopulatedPlace
                | AdministrativeType::Town
                | AdministrativeType::Locality
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdministrativeType::Department => "department",
            AdministrativeType::Province => "province",
            AdministrativeType::District => "district",
            AdministrativeType::City => "city",
            AdministrativeType::PopulatedPlace => "populated_place",
            AdministrativeType::Town => "town",
            AdministrativeType::Locality => "locality",
        }
    }
}

impl std::fmt::Display for AdministrativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdministrativeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != ' ' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "department" | "departamento" => Ok(AdministrativeType::Department),
            "province" | "provincia" => Ok(AdministrativeType::Province),
            "district" | "distrito" => Ok(AdministrativeType::District),
            "city" | "ciudad" => Ok(AdministrativeType::City),
            "populatedplace" | "centropoblado" => Ok(AdministrativeType::PopulatedPlace),
            "town" | "pueblo" => Ok(AdministrativeType::Town),
            "locality" | "localidad" => Ok(AdministrativeType::Locality),
            _ => Err(format!("Unknown administrative type '{}'", s)),
        }
    }
}

/// Coarser territorial classification used by some filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "territorial_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TerritorialLevel {
    Departmental,
    Provincial,
    District,
    Local,
}

impl TerritorialLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerritorialLevel::Departmental => "departmental",
            TerritorialLevel::Provincial => "provincial",
            TerritorialLevel::District => "district",
            TerritorialLevel::Local => "local",
        }
    }
}

impl From<AdministrativeType> for TerritorialLevel {
    fn from(kind: AdministrativeType) -> Self {
        match kind {
            AdministrativeType::Department => TerritorialLevel::Departmental,
            AdministrativeType::Province => TerritorialLevel::Provincial,
            AdministrativeType::District => TerritorialLevel::District,
            _ => TerritorialLevel::Local,
        }
    }
}

impl FromStr for TerritorialLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "departmental" | "departamental" => Ok(TerritorialLevel::Departmental),
            "provincial" => Ok(TerritorialLevel::Provincial),
            "district" | "distrital" => Ok(TerritorialLevel::District),
            "local" => Ok(TerritorialLevel::Local),
            _ => Err(format!("Unknown territorial level '{}'", s)),
        }
    }
}

/// Latitude/longitude pair. Never half-populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Builds a pair only when both components are present
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

/// Normalized locality as held in the catalog snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Locality {
    pub id: Uuid,
    pub name: String,
    /// `None` when the store holds a type this service does not recognize
    pub administrative_type: Option<AdministrativeType>,
    pub territorial_level: Option<TerritorialLevel>,
    pub department: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub official_code: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub description: Option<String>,
    pub observations: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Locality {
    pub fn level_rank(&self) -> u32 {
        AdministrativeType::level_rank(self.administrative_type)
    }

    /// Missing department, province or district
    pub fn has_incomplete_location(&self) -> bool {
        self.department.is_none() || self.province.is_none() || self.district.is_none()
    }
}

/// Raw row as delivered by a store adapter, before normalization
#[derive(Debug, Clone, Default, FromRow)]
pub struct LocalityRecord {
    pub id: Uuid,
    pub name: Option<String>,
    pub administrative_type: Option<AdministrativeType>,
    pub territorial_level: Option<TerritorialLevel>,
    pub department: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub official_code: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub description: Option<String>,
    pub observations: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LocalityRecord {
    /// Normalizes a store row. Returns `None` for rows without a usable name.
    ///
    /// Half coordinate pairs are dropped entirely and a missing active flag
    /// defaults to `true`.
    pub fn into_locality(self) -> Option<Locality> {
        let name = non_blank(self.name)?;

        Some(Locality {
            id: self.id,
            name,
            administrative_type: self.administrative_type,
            territorial_level: self.territorial_level,
            department: non_blank(self.department),
            province: non_blank(self.province),
            district: non_blank(self.district),
            official_code: non_blank(self.official_code),
            coordinates: Coordinates::from_parts(self.lat, self.lng),
            description: self.description,
            observations: self.observations,
            active: self.is_active.unwrap_or(true),
            created_at: self.created_at.unwrap_or_default(),
            updated_at: self.updated_at.unwrap_or_default(),
        })
    }
}

/// Editable fields of a locality, used for both create and full update
#[derive(Debug, Clone, PartialEq)]
pub struct LocalityDraft {
    pub name: String,
    pub administrative_type: AdministrativeType,
    pub territorial_level: TerritorialLevel,
    pub department: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub official_code: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub description: Option<String>,
    pub observations: Option<String>,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_rank_is_strictly_ordered() {
        let ordered = [
            Some(AdministrativeType::Department),
            Some(AdministrativeType::Province),
            Some(AdministrativeType::District),
            Some(AdministrativeType::City),
            Some(AdministrativeType::PopulatedPlace),
            Some(AdministrativeType::Town),
            Some(AdministrativeType::Locality),
            None,
        ];

        for pair in ordered.windows(2) {
            assert!(
                AdministrativeType::level_rank(pair[0]) > AdministrativeType::level_rank(pair[1]),
                "{:?} should outrank {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_record_without_name_is_discarded() {
        let record = LocalityRecord {
            id: Uuid::new_v4(),
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(record.into_locality().is_none());

        let record = LocalityRecord {
            id: Uuid::new_v4(),
            name: None,
            ..Default::default()
        };
        assert!(record.into_locality().is_none());
    }

    #[test]
    fn test_half_coordinates_are_dropped() {
        let record = LocalityRecord {
            id: Uuid::new_v4(),
            name: Some("Ilave".to_string()),
            lat: Some(-16.08),
            lng: None,
            ..Default::default()
        };
        let locality = record.into_locality().unwrap();
        assert_eq!(locality.coordinates, None);
    }

    #[test]
    fn test_active_defaults_to_true_and_blank_parents_become_none() {
        let record = LocalityRecord {
            id: Uuid::new_v4(),
            name: Some(" Juli ".to_string()),
            department: Some("PUNO".to_string()),
            province: Some("".to_string()),
            lat: Some(-16.2),
            lng: Some(-69.4),
            ..Default::default()
        };
        let locality = record.into_locality().unwrap();

        assert_eq!(locality.name, "Juli");
        assert!(locality.active);
        assert_eq!(locality.province, None);
        assert!(locality.has_incomplete_location());
        assert_eq!(
            locality.coordinates,
            Some(Coordinates {
                latitude: -16.2,
                longitude: -69.4
            })
        );
    }

    #[test]
    fn test_administrative_type_parses_spanish_and_english_labels() {
        assert_eq!(
            "Centro Poblado".parse::<AdministrativeType>(),
            Ok(AdministrativeType::PopulatedPlace)
        );
        assert_eq!(
            "populated_place".parse::<AdministrativeType>(),
            Ok(AdministrativeType::PopulatedPlace)
        );
        assert_eq!(
            "DEPARTAMENTO".parse::<AdministrativeType>(),
            Ok(AdministrativeType::Department)
        );
        assert!("hamlet".parse::<AdministrativeType>().is_err());
    }
}
