//! Last-resort catalog served when the store has never answered.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::features::localities::models::{
    AdministrativeType, Coordinates, Locality, TerritorialLevel,
};

/// Supplies the catalog used when no real snapshot is available
pub trait DegradedModeProvider: Send + Sync {
    fn placeholder_catalog(&self) -> Vec<Locality>;
}

/// Disables degraded mode: an unreachable store yields an empty catalog
pub struct NoPlaceholder;

impl DegradedModeProvider for NoPlaceholder {
    fn placeholder_catalog(&self) -> Vec<Locality> {
        Vec::new()
    }
}

/// Small built-in catalog around Lake Titicaca
pub struct PlaceholderCatalog;

const PLACEHOLDER_NOTE: &str = "Placeholder record served while the locality store is unreachable";

#[allow(clippy::too_many_arguments)]
fn placeholder(
    seq: u128,
    name: &str,
    kind: AdministrativeType,
    department: Option<&str>,
    province: Option<&str>,
    district: Option<&str>,
    official_code: &str,
    latitude: f64,
    longitude: f64,
) -> Locality {
    Locality {
        // Fixed ids so repeated degraded refreshes stay comparable
        id: Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0000 | seq),
        name: name.to_string(),
        administrative_type: Some(kind),
        territorial_level: Some(TerritorialLevel::from(kind)),
        department: department.map(str::to_string),
        province: province.map(str::to_string),
        district: district.map(str::to_string),
        official_code: Some(official_code.to_string()),
        coordinates: Some(Coordinates {
            latitude,
            longitude,
        }),
        description: Some(PLACEHOLDER_NOTE.to_string()),
        observations: None,
        active: true,
        created_at: DateTime::<Utc>::default(),
        updated_at: DateTime::<Utc>::default(),
    }
}

impl DegradedModeProvider for PlaceholderCatalog {
    fn placeholder_catalog(&self) -> Vec<Locality> {
        use AdministrativeType as T;

        vec![
            placeholder(1, "PUNO", T::Department, None, None, None, "210000", -15.84, -70.02),
            placeholder(2, "PUNO", T::Province, Some("PUNO"), None, None, "210100", -15.84, -70.02),
            placeholder(3, "PUNO", T::District, Some("PUNO"), Some("PUNO"), None, "210101", -15.84, -70.02),
            placeholder(4, "EL COLLAO", T::Province, Some("PUNO"), None, None, "210500", -16.09, -69.64),
            placeholder(5, "ILAVE", T::District, Some("PUNO"), Some("EL COLLAO"), None, "210501", -16.09, -69.64),
            placeholder(6, "CHUCUITO", T::Province, Some("PUNO"), None, None, "210400", -16.22, -69.46),
            placeholder(7, "JULI", T::District, Some("PUNO"), Some("CHUCUITO"), None, "210401", -16.22, -69.46),
            placeholder(8, "DESAGUADERO", T::District, Some("PUNO"), Some("CHUCUITO"), None, "210404", -16.57, -69.04),
            placeholder(9, "SAN ROMAN", T::Province, Some("PUNO"), None, None, "211100", -15.50, -70.13),
            placeholder(10, "JULIACA", T::City, Some("PUNO"), Some("SAN ROMAN"), Some("JULIACA"), "211101", -15.50, -70.13),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_catalog_is_well_formed() {
        let catalog = PlaceholderCatalog.placeholder_catalog();
        assert!(!catalog.is_empty());

        let mut ids: Vec<Uuid> = catalog.iter().map(|l| l.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());

        for locality in &catalog {
            assert!(!locality.name.is_empty());
            assert_eq!(locality.official_code.as_ref().map(String::len), Some(6));
            if locality.administrative_type == Some(AdministrativeType::Department) {
                assert!(locality.province.is_none() && locality.district.is_none());
            }
        }
    }

    #[test]
    fn test_no_placeholder_is_empty() {
        assert!(NoPlaceholder.placeholder_catalog().is_empty());
    }
}
