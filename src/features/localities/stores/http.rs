use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LocalityStore;
use crate::core::config::HttpStoreConfig;
use crate::core::error::{AppError, Result};
use crate::features::localities::models::{
    DepartmentFilter, LocalityDraft, LocalityFilter, LocalityRecord, INCOMPLETE_LOCATION_SENTINEL,
};

/// Coordinates as sent by the upstream API; either side may be null
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct WireCoordinates {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

/// Locality as sent by the upstream API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLocality {
    id: Uuid,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    administrative_type: Option<String>,
    #[serde(default)]
    territorial_level: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    province: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    official_code: Option<String>,
    #[serde(default)]
    coordinates: Option<WireCoordinates>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    observations: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<WireLocality> for LocalityRecord {
    fn from(wire: WireLocality) -> Self {
        let coordinates = wire.coordinates.unwrap_or_default();

        Self {
            id: wire.id,
            name: wire.name,
            // Unrecognized labels become "unknown" rather than failing the whole fetch
            administrative_type: wire
                .administrative_type
                .and_then(|t| t.parse().ok()),
            territorial_level: wire.territorial_level.and_then(|l| l.parse().ok()),
            department: wire.department,
            province: wire.province,
            district: wire.district,
            official_code: wire.official_code,
            lat: coordinates.latitude,
            lng: coordinates.longitude,
            description: wire.description,
            observations: wire.observations,
            is_active: wire.active,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        }
    }
}

/// Request body for create and update
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireLocalityPayload<'a> {
    name: &'a str,
    administrative_type: &'static str,
    territorial_level: &'static str,
    department: Option<&'a str>,
    province: Option<&'a str>,
    district: Option<&'a str>,
    official_code: Option<&'a str>,
    coordinates: Option<WireCoordinates>,
    description: Option<&'a str>,
    observations: Option<&'a str>,
    active: bool,
}

impl<'a> From<&'a LocalityDraft> for WireLocalityPayload<'a> {
    fn from(draft: &'a LocalityDraft) -> Self {
        Self {
            name: &draft.name,
            administrative_type: draft.administrative_type.as_str(),
            territorial_level: draft.territorial_level.as_str(),
            department: draft.department.as_deref(),
            province: draft.province.as_deref(),
            district: draft.district.as_deref(),
            official_code: draft.official_code.as_deref(),
            coordinates: draft.coordinates.map(|c| WireCoordinates {
                latitude: Some(c.latitude),
                longitude: Some(c.longitude),
            }),
            description: draft.description.as_deref(),
            observations: draft.observations.as_deref(),
            active: draft.active,
        }
    }
}

/// Query-string pairs for a structured filter
fn filter_query(filter: &LocalityFilter) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        params.push(("text", text.to_string()));
    }
    match &filter.department {
        Some(DepartmentFilter::Named(department)) => {
            params.push(("department", department.clone()));
        }
        Some(DepartmentFilter::IncompleteLocation) => {
            params.push(("department", INCOMPLETE_LOCATION_SENTINEL.to_string()));
        }
        None => {}
    }
    if let Some(province) = &filter.province {
        params.push(("province", province.clone()));
    }
    if let Some(kind) = filter.administrative_type {
        params.push(("administrativeType", kind.as_str().to_string()));
    }
    if let Some(level) = filter.territorial_level {
        params.push(("territorialLevel", level.as_str().to_string()));
    }
    if let Some(active) = filter.active {
        params.push(("active", active.to_string()));
    }

    params
}

/// Locality store reached through an upstream REST API
pub struct HttpLocalityStore {
    base_url: String,
    client: reqwest::Client,
    api_token: Option<String>,
}

impl HttpLocalityStore {
    pub fn new(config: &HttpStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/localities{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a request, mapping transport failures and non-2xx answers to `StoreUnavailable`.
    /// A 404 is returned as `Ok(None)` so callers can decide what it means.
    async fn send(&self, request: RequestBuilder) -> Result<Option<Response>> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Validation(format!(
                "Locality store rejected the request: {}",
                body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "HTTP {} - {}",
                status, body
            )));
        }

        Ok(Some(response))
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            AppError::ExternalServiceError(format!("Failed to parse locality store response: {}", e))
        })
    }

    async fn expect_locality(&self, request: RequestBuilder, id: Uuid) -> Result<LocalityRecord> {
        let response = self
            .send(request)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Locality with id '{}' not found", id)))?;
        let wire: WireLocality = Self::parse(response).await?;
        Ok(wire.into())
    }
}

#[async_trait]
impl LocalityStore for HttpLocalityStore {
    async fn list_all(&self) -> Result<Vec<LocalityRecord>> {
        let response = self
            .send(self.client.get(self.url("")))
            .await?
            .ok_or_else(|| AppError::StoreUnavailable("Locality collection not found".into()))?;

        let wire: Vec<WireLocality> = Self::parse(response).await?;
        tracing::debug!("Fetched {} localities from upstream API", wire.len());
        Ok(wire.into_iter().map(Into::into).collect())
    }

    async fn list_by_filter(&self, filter: &LocalityFilter) -> Result<Vec<LocalityRecord>> {
        let request = self.client.get(self.url("")).query(&filter_query(filter));
        let response = self
            .send(request)
            .await?
            .ok_or_else(|| AppError::StoreUnavailable("Locality collection not found".into()))?;

        let wire: Vec<WireLocality> = Self::parse(response).await?;
        Ok(wire.into_iter().map(Into::into).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<LocalityRecord>> {
        let request = self.client.get(self.url(&format!("/{}", id)));
        match self.send(request).await? {
            Some(response) => {
                let wire: WireLocality = Self::parse(response).await?;
                Ok(Some(wire.into()))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, draft: &LocalityDraft) -> Result<LocalityRecord> {
        let request = self
            .client
            .post(self.url(""))
            .json(&WireLocalityPayload::from(draft));
        let response = self.send(request).await?.ok_or_else(|| {
            AppError::StoreUnavailable("Locality collection not found".to_string())
        })?;

        let wire: WireLocality = Self::parse(response).await?;
        Ok(wire.into())
    }

    async fn update(&self, id: Uuid, draft: &LocalityDraft) -> Result<LocalityRecord> {
        let request = self
            .client
            .put(self.url(&format!("/{}", id)))
            .json(&WireLocalityPayload::from(draft));
        self.expect_locality(request, id).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<LocalityRecord> {
        let request = self
            .client
            .patch(self.url(&format!("/{}/active", id)))
            .json(&serde_json::json!({ "active": active }));
        self.expect_locality(request, id).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/{}", id)));
        self.send(request)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Locality with id '{}' not found", id)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::localities::models::{AdministrativeType, TerritorialLevel};

    #[test]
    fn test_wire_locality_with_half_coordinates_and_unknown_type() {
        let json = serde_json::json!({
            "id": "6b0c8f7e-4c1f-4f53-9c53-0d3f1c8e2a10",
            "name": "Ilave",
            "administrativeType": "caserio",
            "territorialLevel": "local",
            "coordinates": { "latitude": -16.08, "longitude": null }
        });

        let wire: WireLocality = serde_json::from_value(json).unwrap();
        let record: LocalityRecord = wire.into();

        assert_eq!(record.administrative_type, None);
        assert_eq!(record.territorial_level, Some(TerritorialLevel::Local));
        assert_eq!(record.lat, Some(-16.08));
        assert_eq!(record.lng, None);
        assert_eq!(record.is_active, None);

        let locality = record.into_locality().unwrap();
        assert_eq!(locality.coordinates, None);
        assert!(locality.active);
    }

    #[test]
    fn test_filter_query_uses_camel_case_keys_and_sentinel() {
        let filter = LocalityFilter {
            department: Some(DepartmentFilter::IncompleteLocation),
            administrative_type: Some(AdministrativeType::PopulatedPlace),
            active: Some(false),
            ..Default::default()
        };

        let params = filter_query(&filter);
        assert_eq!(
            params,
            vec![
                ("department", "__incomplete__".to_string()),
                ("administrativeType", "populated_place".to_string()),
                ("active", "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_store_url_layout() {
        let store = HttpLocalityStore::new(&HttpStoreConfig {
            base_url: "http://upstream.local/api".to_string(),
            timeout: std::time::Duration::from_secs(1),
            api_token: None,
        })
        .unwrap();

        assert_eq!(store.url(""), "http://upstream.local/api/localities");
        assert_eq!(store.url("/abc"), "http://upstream.local/api/localities/abc");
    }
}
