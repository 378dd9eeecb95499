use std::sync::Arc;

use axum::{extract::State, Json};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::localities::dtos::{
    BatchResolveDto, BatchResolveResponseDto, ConsolidateDto, ConsolidationDto, DuplicateGroupDto,
    ResolveCandidateDto, ResolvedLocalityDto,
};
use crate::features::localities::models::LocalityCandidate;
use crate::features::localities::services::UniquenessResolver;
use crate::shared::types::{ApiResponse, Meta};

/// Resolve a place name to its canonical locality, creating it if unknown
#[utoipa::path(
    post,
    path = "/api/localities/resolve",
    request_body = ResolveCandidateDto,
    responses(
        (status = 200, description = "Existing or newly created locality", body = ApiResponse<ResolvedLocalityDto>),
        (status = 400, description = "Empty name"),
        (status = 503, description = "Catalog is not backed by the locality store")
    ),
    tag = "localities"
)]
pub async fn resolve_locality(
    State(resolver): State<Arc<UniquenessResolver>>,
    AppJson(dto): AppJson<ResolveCandidateDto>,
) -> Result<Json<ApiResponse<ResolvedLocalityDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let resolved = resolver
        .resolve_or_create(&LocalityCandidate::from(dto))
        .await?;
    Ok(Json(ApiResponse::success(Some(resolved.into()), None, None)))
}

/// Resolve many names in order. Failed items are reported, never fatal.
#[utoipa::path(
    post,
    path = "/api/localities/resolve/batch",
    request_body = BatchResolveDto,
    responses(
        (status = 200, description = "Per-item outcomes", body = ApiResponse<BatchResolveResponseDto>),
        (status = 400, description = "Empty or oversized batch")
    ),
    tag = "localities"
)]
pub async fn resolve_locality_batch(
    State(resolver): State<Arc<UniquenessResolver>>,
    AppJson(dto): AppJson<BatchResolveDto>,
) -> Result<Json<ApiResponse<BatchResolveResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let candidates: Vec<LocalityCandidate> = dto.candidates.into_iter().map(Into::into).collect();
    let outcomes = resolver.resolve_or_create_batch(&candidates).await;
    Ok(Json(ApiResponse::success(Some(outcomes.into()), None, None)))
}

#[utoipa::path(
    get,
    path = "/api/localities/duplicates",
    responses(
        (status = 200, description = "Groups of localities sharing a normalized name", body = ApiResponse<Vec<DuplicateGroupDto>>)
    ),
    tag = "localities"
)]
pub async fn list_duplicates(
    State(resolver): State<Arc<UniquenessResolver>>,
) -> Result<Json<ApiResponse<Vec<DuplicateGroupDto>>>> {
    let groups: Vec<DuplicateGroupDto> = resolver
        .find_duplicates()
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    let total = groups.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(groups),
        None,
        Some(Meta { total }),
    )))
}

/// Keep the first id and delete the others
///
/// References to the removed ids held elsewhere are not rewritten.
#[utoipa::path(
    post,
    path = "/api/localities/duplicates/consolidate",
    request_body = ConsolidateDto,
    responses(
        (status = 200, description = "Consolidation result", body = ApiResponse<ConsolidationDto>),
        (status = 404, description = "One of the ids does not exist")
    ),
    tag = "localities"
)]
pub async fn consolidate_duplicates(
    State(resolver): State<Arc<UniquenessResolver>>,
    AppJson(dto): AppJson<ConsolidateDto>,
) -> Result<Json<ApiResponse<ConsolidationDto>>> {
    let consolidation = resolver.consolidate(&dto.ids).await?;
    Ok(Json(ApiResponse::success(
        Some(consolidation.into()),
        None,
        None,
    )))
}
