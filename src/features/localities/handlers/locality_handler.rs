use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::localities::dtos::{
    CatalogStatusDto, HierarchyQuery, LocalityListQuery, LocalityResponseDto, LocalitySearchHitDto,
    LocalitySearchQuery, SetActiveDto, UpsertLocalityDto,
};
use crate::features::localities::services::LocalityService;
use crate::shared::types::{ApiResponse, Meta};

fn with_total<T>(items: Vec<T>) -> Json<ApiResponse<Vec<T>>> {
    let total = items.len() as i64;
    Json(ApiResponse::success(Some(items), None, Some(Meta { total })))
}

/// List localities matching a structured filter
///
/// Served from the cached catalog unless `consistent=true`, which reads the store directly.
#[utoipa::path(
    get,
    path = "/api/localities",
    params(LocalityListQuery),
    responses(
        (status = 200, description = "Matching localities in catalog order", body = ApiResponse<Vec<LocalityResponseDto>>),
        (status = 400, description = "Unknown administrative type or territorial level")
    ),
    tag = "localities"
)]
pub async fn list_localities(
    State(service): State<Arc<LocalityService>>,
    Query(query): Query<LocalityListQuery>,
) -> Result<Json<ApiResponse<Vec<LocalityResponseDto>>>> {
    let filter = query.to_filter()?;
    let localities = service.list(&filter, query.consistent).await?;
    Ok(with_total(localities.into_iter().map(Into::into).collect()))
}

/// Ranked free-text search
#[utoipa::path(
    get,
    path = "/api/localities/search",
    params(LocalitySearchQuery),
    responses(
        (status = 200, description = "Localities ordered by relevance", body = ApiResponse<Vec<LocalitySearchHitDto>>),
        (status = 400, description = "Unknown administrative type or territorial level")
    ),
    tag = "localities"
)]
pub async fn search_localities(
    State(service): State<Arc<LocalityService>>,
    Query(query): Query<LocalitySearchQuery>,
) -> Result<Json<ApiResponse<Vec<LocalitySearchHitDto>>>> {
    let filter = query.to_filter()?;
    let hits = service.search(query.q.as_deref(), &filter).await;
    Ok(with_total(hits.into_iter().map(Into::into).collect()))
}

/// Get locality by id, including inactive ones
#[utoipa::path(
    get,
    path = "/api/localities/{id}",
    params(
        ("id" = Uuid, Path, description = "Locality id")
    ),
    responses(
        (status = 200, description = "Locality found", body = ApiResponse<LocalityResponseDto>),
        (status = 404, description = "Locality not found")
    ),
    tag = "localities"
)]
pub async fn get_locality(
    State(service): State<Arc<LocalityService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LocalityResponseDto>>> {
    let locality = service.get(id).await?;
    Ok(Json(ApiResponse::success(Some(locality.into()), None, None)))
}

#[utoipa::path(
    post,
    path = "/api/localities",
    request_body = UpsertLocalityDto,
    responses(
        (status = 200, description = "Locality created", body = ApiResponse<LocalityResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 503, description = "Locality store unavailable")
    ),
    tag = "localities"
)]
pub async fn create_locality(
    State(service): State<Arc<LocalityService>>,
    AppJson(dto): AppJson<UpsertLocalityDto>,
) -> Result<Json<ApiResponse<LocalityResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let locality = service.create(dto).await?;
    Ok(Json(ApiResponse::success(
        Some(locality.into()),
        Some("Locality created".to_string()),
        None,
    )))
}

#[utoipa::path(
    put,
    path = "/api/localities/{id}",
    params(
        ("id" = Uuid, Path, description = "Locality id")
    ),
    request_body = UpsertLocalityDto,
    responses(
        (status = 200, description = "Locality updated", body = ApiResponse<LocalityResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Locality not found")
    ),
    tag = "localities"
)]
pub async fn update_locality(
    State(service): State<Arc<LocalityService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpsertLocalityDto>,
) -> Result<Json<ApiResponse<LocalityResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let locality = service.update(id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(locality.into()),
        Some("Locality updated".to_string()),
        None,
    )))
}

#[utoipa::path(
    patch,
    path = "/api/localities/{id}/active",
    params(
        ("id" = Uuid, Path, description = "Locality id")
    ),
    request_body = SetActiveDto,
    responses(
        (status = 200, description = "Active flag updated", body = ApiResponse<LocalityResponseDto>),
        (status = 404, description = "Locality not found")
    ),
    tag = "localities"
)]
pub async fn set_locality_active(
    State(service): State<Arc<LocalityService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<SetActiveDto>,
) -> Result<Json<ApiResponse<LocalityResponseDto>>> {
    let locality = service.set_active(id, dto.active).await?;
    Ok(Json(ApiResponse::success(Some(locality.into()), None, None)))
}

#[utoipa::path(
    delete,
    path = "/api/localities/{id}",
    params(
        ("id" = Uuid, Path, description = "Locality id")
    ),
    responses(
        (status = 200, description = "Locality deleted"),
        (status = 404, description = "Locality not found")
    ),
    tag = "localities"
)]
pub async fn delete_locality(
    State(service): State<Arc<LocalityService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Locality deleted".to_string()),
        None,
    )))
}

#[utoipa::path(
    get,
    path = "/api/localities/hierarchy/departments",
    responses(
        (status = 200, description = "Distinct department names", body = ApiResponse<Vec<String>>)
    ),
    tag = "localities"
)]
pub async fn list_departments(
    State(service): State<Arc<LocalityService>>,
) -> Result<Json<ApiResponse<Vec<String>>>> {
    Ok(with_total(service.departments().await))
}

#[utoipa::path(
    get,
    path = "/api/localities/hierarchy/provinces",
    params(HierarchyQuery),
    responses(
        (status = 200, description = "Provinces in the department", body = ApiResponse<Vec<String>>),
        (status = 400, description = "Missing department")
    ),
    tag = "localities"
)]
pub async fn list_provinces(
    State(service): State<Arc<LocalityService>>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<ApiResponse<Vec<String>>>> {
    let department = query.require_department()?;
    Ok(with_total(service.provinces(department).await))
}

#[utoipa::path(
    get,
    path = "/api/localities/hierarchy/districts",
    params(HierarchyQuery),
    responses(
        (status = 200, description = "Districts in the province", body = ApiResponse<Vec<String>>),
        (status = 400, description = "Missing department or province")
    ),
    tag = "localities"
)]
pub async fn list_districts(
    State(service): State<Arc<LocalityService>>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<ApiResponse<Vec<String>>>> {
    let department = query.require_department()?;
    let province = query.require_province()?;
    Ok(with_total(service.districts(department, province).await))
}

/// Cache health: size, age, data source and last refresh error
#[utoipa::path(
    get,
    path = "/api/localities/catalog/status",
    responses(
        (status = 200, description = "Catalog cache status", body = ApiResponse<CatalogStatusDto>)
    ),
    tag = "localities"
)]
pub async fn get_catalog_status(
    State(service): State<Arc<LocalityService>>,
) -> Result<Json<ApiResponse<CatalogStatusDto>>> {
    let status = service.catalog_status().await;
    Ok(Json(ApiResponse::success(Some(status.into()), None, None)))
}

#[utoipa::path(
    post,
    path = "/api/localities/catalog/refresh",
    responses(
        (status = 200, description = "Catalog refreshed; check lastError for failures", body = ApiResponse<CatalogStatusDto>)
    ),
    tag = "localities"
)]
pub async fn refresh_catalog(
    State(service): State<Arc<LocalityService>>,
) -> Result<Json<ApiResponse<CatalogStatusDto>>> {
    let status = service.refresh_catalog().await;
    Ok(Json(ApiResponse::success(Some(status.into()), None, None)))
}
