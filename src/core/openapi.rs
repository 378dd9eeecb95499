use utoipa::{Modify, OpenApi};

use crate::features::localities::models::{
    AdministrativeType, Coordinates, ProvenanceKind, TerritorialLevel,
};
use crate::features::localities::services::SnapshotSource;
use crate::features::localities::{dtos as localities_dtos, handlers as localities_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Catalog
        localities_handlers::list_localities,
        localities_handlers::search_localities,
        localities_handlers::get_locality,
        localities_handlers::create_locality,
        localities_handlers::update_locality,
        localities_handlers::set_locality_active,
        localities_handlers::delete_locality,
        // Hierarchy
        localities_handlers::list_departments,
        localities_handlers::list_provinces,
        localities_handlers::list_districts,
        // Resolution
        localities_handlers::resolve_locality,
        localities_handlers::resolve_locality_batch,
        localities_handlers::list_duplicates,
        localities_handlers::consolidate_duplicates,
        // Cache
        localities_handlers::get_catalog_status,
        localities_handlers::refresh_catalog,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Models
            AdministrativeType,
            TerritorialLevel,
            Coordinates,
            ProvenanceKind,
            SnapshotSource,
            // Requests
            localities_dtos::UpsertLocalityDto,
            localities_dtos::SetActiveDto,
            localities_dtos::ResolveCandidateDto,
            localities_dtos::BatchResolveDto,
            localities_dtos::ConsolidateDto,
            // Responses
            localities_dtos::LocalityResponseDto,
            localities_dtos::LocalitySearchHitDto,
            localities_dtos::ResolvedLocalityDto,
            localities_dtos::BatchItemResultDto,
            localities_dtos::BatchResolveResponseDto,
            localities_dtos::DuplicateGroupDto,
            localities_dtos::ConsolidationDto,
            localities_dtos::CatalogStatusDto,
            ApiResponse<localities_dtos::LocalityResponseDto>,
            ApiResponse<localities_dtos::CatalogStatusDto>,
        )
    ),
    tags(
        (name = "localities", description = "Territorial locality catalog, ranked search, resolution and deduplication"),
    ),
    info(
        title = "Ubigeo Locality API",
        version = "0.1.0",
        description = "API documentation for the territorial locality service",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_locality_routes() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/localities",
            "/api/localities/search",
            "/api/localities/{id}",
            "/api/localities/{id}/active",
            "/api/localities/resolve/batch",
            "/api/localities/duplicates/consolidate",
            "/api/localities/catalog/refresh",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_info_modifier_overrides_title() {
        let mut doc = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Padron".to_string(),
            version: "2.0.0".to_string(),
            description: "Internal".to_string(),
        }
        .modify(&mut doc);

        assert_eq!(doc.info.title, "Padron");
        assert_eq!(doc.info.version, "2.0.0");
    }
}
