use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::localities::models::{
    AdministrativeType, Consolidation, Coordinates, DepartmentFilter, DuplicateGroup, Locality,
    LocalityCandidate, LocalityFilter, Provenance, ProvenanceKind, ResolvedLocality,
    TerritorialLevel,
};
use crate::features::localities::services::{BatchOutcome, CatalogStatus, RankedLocality, SnapshotSource};

// =============================================================================
// RESPONSES
// =============================================================================

/// Response DTO for locality data
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalityResponseDto {
    pub id: Uuid,
    pub name: String,
    pub administrative_type: Option<AdministrativeType>,
    pub territorial_level: Option<TerritorialLevel>,
    pub department: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub official_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Locality> for LocalityResponseDto {
    fn from(l: Locality) -> Self {
        Self {
            id: l.id,
            name: l.name,
            administrative_type: l.administrative_type,
            territorial_level: l.territorial_level,
            department: l.department,
            province: l.province,
            district: l.district,
            official_code: l.official_code,
            coordinates: l.coordinates,
            description: l.description,
            observations: l.observations,
            active: l.active,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

/// Ranked search result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalitySearchHitDto {
    #[serde(flatten)]
    pub locality: LocalityResponseDto,
    /// Relevance score, 0 when no query was given
    pub score: u32,
}

impl From<RankedLocality> for LocalitySearchHitDto {
    fn from(ranked: RankedLocality) -> Self {
        Self {
            locality: ranked.locality.into(),
            score: ranked.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocalityDto {
    pub id: Uuid,
    pub name: String,
    pub is_new: bool,
}

impl From<ResolvedLocality> for ResolvedLocalityDto {
    fn from(r: ResolvedLocality) -> Self {
        Self {
            id: r.id,
            name: r.name,
            is_new: r.is_new,
        }
    }
}

/// Outcome of one batch item: either `resolved` or `error` is set
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResultDto {
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedLocalityDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BatchOutcome> for BatchItemResultDto {
    fn from(outcome: BatchOutcome) -> Self {
        let (resolved, error) = match outcome.result {
            Ok(resolved) => (Some(resolved.into()), None),
            Err(e) => (None, Some(e.to_string())),
        };

        Self {
            index: outcome.index,
            name: outcome.name,
            resolved,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchResolveResponseDto {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResultDto>,
}

impl From<Vec<BatchOutcome>> for BatchResolveResponseDto {
    fn from(outcomes: Vec<BatchOutcome>) -> Self {
        let results: Vec<BatchItemResultDto> = outcomes.into_iter().map(Into::into).collect();
        let failed = results.iter().filter(|r| r.error.is_some()).count();

        Self {
            succeeded: results.len() - failed,
            failed,
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroupDto {
    pub normalized_name: String,
    pub ids: Vec<Uuid>,
}

impl From<DuplicateGroup> for DuplicateGroupDto {
    fn from(g: DuplicateGroup) -> Self {
        Self {
            normalized_name: g.normalized_name,
            ids: g.ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationDto {
    pub canonical_id: Option<Uuid>,
    pub removed_ids: Vec<Uuid>,
}

impl From<Consolidation> for ConsolidationDto {
    fn from(c: Consolidation) -> Self {
        Self {
            canonical_id: c.canonical_id,
            removed_ids: c.removed_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatusDto {
    pub size: usize,
    pub source: SnapshotSource,
    /// Seconds since the last successful fetch
    pub age_seconds: Option<u64>,
    pub ttl_seconds: u64,
    pub stale: bool,
    pub refresh_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<CatalogStatus> for CatalogStatusDto {
    fn from(s: CatalogStatus) -> Self {
        Self {
            size: s.size,
            source: s.source,
            age_seconds: s.age.map(|age| age.as_secs()),
            ttl_seconds: s.ttl.as_secs(),
            stale: s.stale,
            refresh_count: s.refresh_count,
            last_error: s.last_error,
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_filter(
    text: Option<&str>,
    department: Option<&str>,
    province: Option<&str>,
    administrative_type: Option<&str>,
    territorial_level: Option<&str>,
    active: Option<bool>,
) -> Result<LocalityFilter> {
    let administrative_type = non_blank(administrative_type)
        .map(str::parse::<AdministrativeType>)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let territorial_level = non_blank(territorial_level)
        .map(str::parse::<TerritorialLevel>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    Ok(LocalityFilter {
        text: non_blank(text).map(str::to_string),
        department: non_blank(department).map(DepartmentFilter::parse),
        province: non_blank(province).map(str::to_string),
        administrative_type,
        territorial_level,
        // Inactive localities stay hidden unless asked for
        active: Some(active.unwrap_or(true)),
    })
}

/// Query parameters for listing localities
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct LocalityListQuery {
    /// Substring of name, department, province or district
    #[param(example = "collao")]
    pub text: Option<String>,
    /// Department name, or `__incomplete__` for rows with missing parents
    #[param(example = "PUNO")]
    pub department: Option<String>,
    pub province: Option<String>,
    #[param(example = "district")]
    pub administrative_type: Option<String>,
    #[param(example = "local")]
    pub territorial_level: Option<String>,
    /// Defaults to `true`; pass `false` to list deactivated localities
    pub active: Option<bool>,
    /// Read from the store instead of the cached catalog
    #[serde(default)]
    pub consistent: bool,
}

impl LocalityListQuery {
    pub fn to_filter(&self) -> Result<LocalityFilter> {
        parse_filter(
            self.text.as_deref(),
            self.department.as_deref(),
            self.province.as_deref(),
            self.administrative_type.as_deref(),
            self.territorial_level.as_deref(),
            self.active,
        )
    }
}

/// Query parameters for ranked search
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct LocalitySearchQuery {
    /// Free-text query, case and accent insensitive
    #[param(example = "ilave")]
    pub q: Option<String>,
    pub department: Option<String>,
    pub province: Option<String>,
    pub administrative_type: Option<String>,
    pub territorial_level: Option<String>,
    /// Defaults to `true`
    pub active: Option<bool>,
}

impl LocalitySearchQuery {
    pub fn to_filter(&self) -> Result<LocalityFilter> {
        parse_filter(
            None,
            self.department.as_deref(),
            self.province.as_deref(),
            self.administrative_type.as_deref(),
            self.territorial_level.as_deref(),
            self.active,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyQuery {
    #[param(example = "PUNO")]
    pub department: Option<String>,
    #[param(example = "EL COLLAO")]
    pub province: Option<String>,
}

impl HierarchyQuery {
    pub fn require_department(&self) -> Result<&str> {
        required(self.department.as_deref(), "department")
    }

    pub fn require_province(&self) -> Result<&str> {
        required(self.province.as_deref(), "province")
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    non_blank(value)
        .ok_or_else(|| AppError::BadRequest(format!("Query parameter '{}' is required", field)))
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Request DTO for creating or fully updating a locality
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertLocalityDto {
    #[validate(length(max = 200, message = "Name must not exceed 200 characters"))]
    pub name: String,
    pub administrative_type: AdministrativeType,
    /// Derived from the administrative type when omitted
    pub territorial_level: Option<TerritorialLevel>,
    #[validate(length(max = 100, message = "Department must not exceed 100 characters"))]
    pub department: Option<String>,
    #[validate(length(max = 100, message = "Province must not exceed 100 characters"))]
    pub province: Option<String>,
    #[validate(length(max = 100, message = "District must not exceed 100 characters"))]
    pub district: Option<String>,
    /// Six-digit UBIGEO code
    #[schema(example = "210501")]
    pub official_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 2000, message = "Observations must not exceed 2000 characters"))]
    pub observations: Option<String>,
    /// Defaults to true on create; keeps the current value on update
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveDto {
    pub active: bool,
}

/// A place name to resolve to a canonical locality
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveCandidateDto {
    #[validate(length(max = 200, message = "Name must not exceed 200 characters"))]
    pub name: String,
    pub department: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    #[serde(default = "default_provenance")]
    pub provenance: ProvenanceKind,
    /// Source file, route code or similar
    pub reference: Option<String>,
}

fn default_provenance() -> ProvenanceKind {
    ProvenanceKind::ManualEntry
}

impl From<ResolveCandidateDto> for LocalityCandidate {
    fn from(dto: ResolveCandidateDto) -> Self {
        Self {
            name: dto.name,
            department: dto.department,
            province: dto.province,
            district: dto.district,
            provenance: Provenance {
                kind: dto.provenance,
                reference: dto.reference,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchResolveDto {
    #[validate(length(min = 1, max = 1000, message = "Batch must contain 1-1000 candidates"))]
    pub candidates: Vec<ResolveCandidateDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateDto {
    /// First id is kept, the rest are deleted
    pub ids: Vec<Uuid>,
}
