use std::sync::Arc;

use uuid::Uuid;

use super::catalog_cache::{CatalogCache, CatalogStatus};
use super::matcher;
use crate::core::error::{AppError, Result};
use crate::features::localities::dtos::UpsertLocalityDto;
use crate::features::localities::models::{
    AdministrativeType, Coordinates, Locality, LocalityDraft, LocalityFilter, LocalityRecord,
    TerritorialLevel,
};
use crate::features::localities::stores::LocalityStore;
use crate::shared::validation::{LATITUDE_RANGE, LONGITUDE_RANGE, UBIGEO_REGEX};

/// Owned search result, detached from the snapshot it was ranked in
#[derive(Debug, Clone)]
pub struct RankedLocality {
    pub locality: Locality,
    pub score: u32,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Checks an upsert request and turns it into a draft. `current_active` is
/// used when the request leaves `active` unset.
pub fn validate_draft(dto: UpsertLocalityDto, current_active: bool) -> Result<LocalityDraft> {
    let name = dto.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name: must not be empty".to_string()));
    }

    let coordinates = match (dto.latitude, dto.longitude) {
        (None, None) => None,
        (Some(latitude), Some(longitude)) => {
            if !LATITUDE_RANGE.contains(&latitude) {
                return Err(AppError::Validation(
                    "latitude: must be between -90 and 90".to_string(),
                ));
            }
            if !LONGITUDE_RANGE.contains(&longitude) {
                return Err(AppError::Validation(
                    "longitude: must be between -180 and 180".to_string(),
                ));
            }
            Some(Coordinates {
                latitude,
                longitude,
            })
        }
        _ => {
            return Err(AppError::Validation(
                "coordinates: latitude and longitude must be given together".to_string(),
            ))
        }
    };

    let official_code = blank_to_none(dto.official_code);
    if let Some(code) = &official_code {
        if !UBIGEO_REGEX.is_match(code) {
            return Err(AppError::Validation(
                "officialCode: must be exactly six digits".to_string(),
            ));
        }
    }

    let department = blank_to_none(dto.department);
    let province = blank_to_none(dto.province);
    let district = blank_to_none(dto.district);

    match dto.administrative_type {
        AdministrativeType::Department if province.is_some() || district.is_some() => {
            return Err(AppError::Validation(
                "province: a department cannot have a province or district".to_string(),
            ));
        }
        AdministrativeType::Province if district.is_some() => {
            return Err(AppError::Validation(
                "district: a province cannot have a district".to_string(),
            ));
        }
        _ => {}
    }

    Ok(LocalityDraft {
        name,
        administrative_type: dto.administrative_type,
        territorial_level: dto
            .territorial_level
            .unwrap_or_else(|| TerritorialLevel::from(dto.administrative_type)),
        department,
        province,
        district,
        official_code,
        coordinates,
        description: blank_to_none(dto.description),
        observations: blank_to_none(dto.observations),
        active: dto.active.unwrap_or(current_active),
    })
}

fn normalized(record: LocalityRecord) -> Result<Locality> {
    let id = record.id;
    record.into_locality().ok_or_else(|| {
        AppError::ExternalServiceError(format!("Locality store returned a nameless row for '{}'", id))
    })
}

/// Read and write access to localities for edit forms and listings
pub struct LocalityService {
    cache: Arc<CatalogCache>,
    store: Arc<dyn LocalityStore>,
}

impl LocalityService {
    pub fn new(cache: Arc<CatalogCache>, store: Arc<dyn LocalityStore>) -> Self {
        Self { cache, store }
    }

    /// Looks in the snapshot first, then asks the store
    pub async fn get(&self, id: Uuid) -> Result<Locality> {
        let snapshot = self.cache.get(false).await;
        if let Some(locality) = snapshot.find(id) {
            return Ok(locality.clone());
        }

        let record = self
            .store
            .get_by_id(id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch locality {}: {:?}", id, e);
                e
            })?
            .ok_or_else(|| AppError::NotFound(format!("Locality with id '{}' not found", id)))?;

        normalized(record)
    }

    /// Filtered listing, served from the cache unless `consistent` is set
    pub async fn list(&self, filter: &LocalityFilter, consistent: bool) -> Result<Vec<Locality>> {
        if consistent {
            let records = self.store.list_by_filter(filter).await.map_err(|e| {
                tracing::error!("Failed to list localities from store: {:?}", e);
                e
            })?;
            return Ok(records
                .into_iter()
                .filter_map(LocalityRecord::into_locality)
                .collect());
        }

        let snapshot = self.cache.get(false).await;
        Ok(matcher::filter(snapshot.localities(), filter)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn search(&self, query: Option<&str>, filter: &LocalityFilter) -> Vec<RankedLocality> {
        let snapshot = self.cache.get(false).await;

        matcher::search(snapshot.localities(), query, Some(filter))
            .into_iter()
            .map(|hit| RankedLocality {
                locality: hit.locality.clone(),
                score: hit.score,
            })
            .collect()
    }

    pub async fn departments(&self) -> Vec<String> {
        let snapshot = self.cache.get(false).await;
        matcher::departments(snapshot.localities())
    }

    pub async fn provinces(&self, department: &str) -> Vec<String> {
        let snapshot = self.cache.get(false).await;
        matcher::provinces(snapshot.localities(), department)
    }

    pub async fn districts(&self, department: &str, province: &str) -> Vec<String> {
        let snapshot = self.cache.get(false).await;
        matcher::districts(snapshot.localities(), department, province)
    }

    pub async fn create(&self, dto: UpsertLocalityDto) -> Result<Locality> {
        let draft = validate_draft(dto, true)?;

        let record = self.store.create(&draft).await.map_err(|e| {
            tracing::error!("Failed to create locality '{}': {:?}", draft.name, e);
            e
        })?;
        tracing::info!("Created locality '{}' ({})", draft.name, record.id);

        self.cache.refresh_after_write().await;
        normalized(record)
    }

    pub async fn update(&self, id: Uuid, dto: UpsertLocalityDto) -> Result<Locality> {
        let current = self.get(id).await?;
        let draft = validate_draft(dto, current.active)?;

        let record = self.store.update(id, &draft).await.map_err(|e| {
            tracing::error!("Failed to update locality {}: {:?}", id, e);
            e
        })?;

        self.cache.refresh_after_write().await;
        normalized(record)
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Locality> {
        let record = self.store.set_active(id, active).await.map_err(|e| {
            tracing::error!("Failed to set active={} on locality {}: {:?}", active, id, e);
            e
        })?;
        tracing::info!("Locality {} active set to {}", id, active);

        self.cache.refresh_after_write().await;
        normalized(record)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await.map_err(|e| {
            tracing::error!("Failed to delete locality {}: {:?}", id, e);
            e
        })?;
        tracing::info!("Deleted locality {}", id);

        self.cache.refresh_after_write().await;
        Ok(())
    }

    pub async fn catalog_status(&self) -> CatalogStatus {
        self.cache.status().await
    }

    /// Forces a store fetch, bypassing the TTL
    pub async fn refresh_catalog(&self) -> CatalogStatus {
        self.cache.get(true).await;
        self.cache.status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::localities::services::degraded_mode::NoPlaceholder;
    use crate::shared::test_helpers::{record, InMemoryLocalityStore};
    use std::time::Duration;

    fn dto(name: &str, kind: AdministrativeType) -> UpsertLocalityDto {
        UpsertLocalityDto {
            name: name.to_string(),
            administrative_type: kind,
            territorial_level: None,
            department: Some("PUNO".to_string()),
            province: None,
            district: None,
            official_code: None,
            latitude: None,
            longitude: None,
            description: None,
            observations: None,
            active: None,
        }
    }

    fn service_with(store: Arc<InMemoryLocalityStore>) -> LocalityService {
        let cache = Arc::new(CatalogCache::new(
            store.clone(),
            Arc::new(NoPlaceholder),
            Duration::from_secs(300),
        ));
        LocalityService::new(cache, store)
    }

    #[test]
    fn test_validate_draft_derives_level_and_defaults_active() {
        let draft = validate_draft(dto(" Ilave ", AdministrativeType::District), true).unwrap();

        assert_eq!(draft.name, "Ilave");
        assert_eq!(draft.territorial_level, TerritorialLevel::District);
        assert!(draft.active);
    }

    #[test]
    fn test_validate_draft_rejects_half_coordinates() {
        let mut request = dto("Ilave", AdministrativeType::District);
        request.latitude = Some(-16.08);

        let err = validate_draft(request, true).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("coordinates")));
    }

    #[test]
    fn test_validate_draft_rejects_out_of_range_coordinates() {
        let mut request = dto("Ilave", AdministrativeType::District);
        request.latitude = Some(-96.0);
        request.longitude = Some(-69.6);

        let err = validate_draft(request, true).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("latitude")));
    }

    #[test]
    fn test_validate_draft_rejects_bad_official_code() {
        let mut request = dto("Ilave", AdministrativeType::District);
        request.official_code = Some("21050".to_string());

        let err = validate_draft(request, true).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("officialCode")));
    }

    #[test]
    fn test_validate_draft_rejects_inconsistent_parents() {
        let mut request = dto("Puno", AdministrativeType::Department);
        request.province = Some("PUNO".to_string());
        assert!(validate_draft(request, true).is_err());

        let mut request = dto("Chucuito", AdministrativeType::Province);
        request.district = Some("JULI".to_string());
        assert!(validate_draft(request, true).is_err());
    }

    #[test]
    fn test_validate_draft_rejects_blank_name() {
        let err = validate_draft(dto("   ", AdministrativeType::Town), true).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("name")));
    }

    #[tokio::test]
    async fn test_create_then_get_through_snapshot() {
        let store = Arc::new(InMemoryLocalityStore::new());
        let service = service_with(store.clone());

        let created = service
            .create(dto("Pilcuyo", AdministrativeType::District))
            .await
            .unwrap();
        let fetched = service.get(created.id).await.unwrap();

        assert_eq!(fetched.name, "Pilcuyo");
        assert_eq!(service.catalog_status().await.size, 1);
    }

    #[tokio::test]
    async fn test_invalid_create_never_reaches_store() {
        let store = Arc::new(InMemoryLocalityStore::new());
        let service = service_with(store.clone());

        let mut request = dto("Pilcuyo", AdministrativeType::District);
        request.longitude = Some(-69.5);

        assert!(service.create(request).await.is_err());
        assert_eq!(store.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_falls_back_to_store_for_rows_missing_from_snapshot() {
        let store = Arc::new(InMemoryLocalityStore::new());
        let service = service_with(store.clone());
        service.refresh_catalog().await;

        let late = record("Conduriri", AdministrativeType::District, Some("PUNO"), None, None);
        let id = late.id;
        store.push(late);

        assert_eq!(service.get(id).await.unwrap().name, "Conduriri");
        assert!(matches!(
            service.get(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_active_flag_when_unset() {
        let mut existing = record("Juli", AdministrativeType::District, Some("PUNO"), None, None);
        existing.is_active = Some(false);
        let id = existing.id;
        let store = Arc::new(InMemoryLocalityStore::with_records(vec![existing]));
        let service = service_with(store);

        let mut request = dto("Juli", AdministrativeType::District);
        request.province = Some("CHUCUITO".to_string());
        let updated = service.update(id, request).await.unwrap();

        assert!(!updated.active);
        assert_eq!(updated.province.as_deref(), Some("CHUCUITO"));
    }

    #[tokio::test]
    async fn test_writes_refresh_the_cache() {
        let existing = record("Juli", AdministrativeType::District, Some("PUNO"), None, None);
        let id = existing.id;
        let store = Arc::new(InMemoryLocalityStore::with_records(vec![existing]));
        let service = service_with(store.clone());

        service.set_active(id, false).await.unwrap();
        let inactive = LocalityFilter {
            active: Some(false),
            ..Default::default()
        };
        assert_eq!(service.list(&inactive, false).await.unwrap().len(), 1);

        service.delete(id).await.unwrap();
        assert!(service.list(&LocalityFilter::default(), false).await.unwrap().is_empty());
        assert!(matches!(service.delete(id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_consistent_list_reads_from_store() {
        let store = Arc::new(InMemoryLocalityStore::new());
        let service = service_with(store.clone());
        service.refresh_catalog().await;

        store.push(record("Zepita", AdministrativeType::District, Some("PUNO"), None, None));

        let filter = LocalityFilter::default();
        assert!(service.list(&filter, false).await.unwrap().is_empty());
        assert_eq!(service.list(&filter, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_snapshot() {
        let store = Arc::new(InMemoryLocalityStore::with_records(vec![
            record("Juliaca", AdministrativeType::City, Some("PUNO"), Some("SAN ROMAN"), None),
            record("Juli", AdministrativeType::District, Some("PUNO"), Some("CHUCUITO"), None),
        ]));
        let service = service_with(store);

        let hits = service.search(Some("juli"), &LocalityFilter::default()).await;

        assert_eq!(hits[0].locality.name, "Juli");
        assert_eq!(hits[0].score, 1000);
        assert_eq!(hits[1].score, 500);
    }
}
