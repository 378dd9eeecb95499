use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::features::localities::handlers;
use crate::features::localities::services::{LocalityService, UniquenessResolver};

/// Create routes for the localities feature
pub fn routes(service: Arc<LocalityService>, resolver: Arc<UniquenessResolver>) -> Router {
    // Catalog, hierarchy and CRUD routes with LocalityService
    // (static segments must come before {id})
    let locality_routes = Router::new()
        .route(
            "/api/localities",
            get(handlers::list_localities).post(handlers::create_locality),
        )
        .route("/api/localities/search", get(handlers::search_localities))
        .route(
            "/api/localities/hierarchy/departments",
            get(handlers::list_departments),
        )
        .route(
            "/api/localities/hierarchy/provinces",
            get(handlers::list_provinces),
        )
        .route(
            "/api/localities/hierarchy/districts",
            get(handlers::list_districts),
        )
        .route(
            "/api/localities/catalog/status",
            get(handlers::get_catalog_status),
        )
        .route(
            "/api/localities/catalog/refresh",
            post(handlers::refresh_catalog),
        )
        .route(
            "/api/localities/{id}",
            get(handlers::get_locality)
                .put(handlers::update_locality)
                .delete(handlers::delete_locality),
        )
        .route(
            "/api/localities/{id}/active",
            patch(handlers::set_locality_active),
        )
        .with_state(service);

    // Resolution and deduplication routes with UniquenessResolver
    let resolution_routes = Router::new()
        .route("/api/localities/resolve", post(handlers::resolve_locality))
        .route(
            "/api/localities/resolve/batch",
            post(handlers::resolve_locality_batch),
        )
        .route("/api/localities/duplicates", get(handlers::list_duplicates))
        .route(
            "/api/localities/duplicates/consolidate",
            post(handlers::consolidate_duplicates),
        )
        .with_state(resolver);

    Router::new().merge(locality_routes).merge(resolution_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::localities::models::AdministrativeType;
    use crate::features::localities::services::{CatalogCache, PlaceholderCatalog};
    use crate::shared::test_helpers::{record, InMemoryLocalityStore};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use fake::faker::address::en::CityName;
    use fake::Fake;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn server_with(store: Arc<InMemoryLocalityStore>) -> TestServer {
        let cache = Arc::new(CatalogCache::new(
            store.clone(),
            Arc::new(PlaceholderCatalog),
            Duration::from_secs(300),
        ));
        let service = Arc::new(LocalityService::new(Arc::clone(&cache), store.clone()));
        let resolver = Arc::new(UniquenessResolver::new(cache, store));

        TestServer::new(routes(service, resolver)).unwrap()
    }

    fn puno_store() -> Arc<InMemoryLocalityStore> {
        Arc::new(InMemoryLocalityStore::with_records(vec![
            record("Puno", AdministrativeType::Province, Some("PUNO"), None, None),
            record(
                "Ilave",
                AdministrativeType::District,
                Some("PUNO"),
                Some("EL COLLAO"),
                None,
            ),
            record(
                "Juli",
                AdministrativeType::District,
                Some("PUNO"),
                Some("CHUCUITO"),
                None,
            ),
        ]))
    }

    #[tokio::test]
    async fn test_search_returns_ranked_envelope() {
        let server = server_with(puno_store());

        let response = server
            .get("/api/localities/search")
            .add_query_param("q", "puno")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["name"], "Puno");
        assert_eq!(body["data"][0]["score"], 1800);
        assert_eq!(body["meta"]["total"], 3);
    }

    #[tokio::test]
    async fn test_list_with_unknown_type_is_bad_request() {
        let server = server_with(puno_store());

        let response = server
            .get("/api/localities")
            .add_query_param("administrativeType", "hamlet")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_list_filters_by_province() {
        let server = server_with(puno_store());

        let response = server
            .get("/api/localities")
            .add_query_param("province", "chucuito")
            .await;

        let body: Value = response.json();
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"][0]["name"], "Juli");
    }

    #[tokio::test]
    async fn test_create_validation_error_uses_envelope() {
        let server = server_with(puno_store());

        let response = server
            .post("/api/localities")
            .json(&json!({
                "name": "Pilcuyo",
                "administrativeType": "district",
                "department": "PUNO",
                "latitude": -16.1
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().starts_with("coordinates"));
    }

    #[tokio::test]
    async fn test_create_update_and_toggle_locality() {
        let server = server_with(puno_store());

        let created: Value = server
            .post("/api/localities")
            .json(&json!({
                "name": "Pilcuyo",
                "administrativeType": "district",
                "department": "PUNO",
                "province": "EL COLLAO",
                "officialCode": "210503"
            }))
            .await
            .json();
        let id = created["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(created["data"]["territorialLevel"], "district");

        let updated: Value = server
            .put(&format!("/api/localities/{}", id))
            .json(&json!({
                "name": "Pilcuyo",
                "administrativeType": "district",
                "department": "PUNO",
                "province": "EL COLLAO",
                "latitude": -16.11,
                "longitude": -69.55
            }))
            .await
            .json();
        assert_eq!(updated["data"]["coordinates"]["latitude"], -16.11);

        let toggled: Value = server
            .patch(&format!("/api/localities/{}/active", id))
            .json(&json!({ "active": false }))
            .await
            .json();
        assert_eq!(toggled["data"]["active"], false);

        let fetched: Value = server.get(&format!("/api/localities/{}", id)).await.json();
        assert_eq!(fetched["data"]["active"], false);
    }

    #[tokio::test]
    async fn test_deactivated_locality_hidden_from_default_queries() {
        let store = puno_store();
        let juli_id = store.records()[2].id;
        let server = server_with(store);

        server
            .patch(&format!("/api/localities/{}/active", juli_id))
            .json(&json!({ "active": false }))
            .await;

        let listed: Value = server.get("/api/localities").await.json();
        assert_eq!(listed["meta"]["total"], 2);

        let hits: Value = server
            .get("/api/localities/search")
            .add_query_param("q", "juli")
            .await
            .json();
        assert_eq!(hits["meta"]["total"], 0);

        let inactive: Value = server
            .get("/api/localities")
            .add_query_param("active", "false")
            .await
            .json();
        assert_eq!(inactive["data"][0]["name"], "Juli");

        let fetched = server.get(&format!("/api/localities/{}", juli_id)).await;
        assert_eq!(fetched.status_code(), StatusCode::OK);
        assert_eq!(fetched.json::<Value>()["data"]["active"], false);
    }

    #[tokio::test]
    async fn test_get_unknown_locality_is_not_found() {
        let server = server_with(puno_store());

        let response = server
            .get("/api/localities/6b0c8f7e-4c1f-4f53-9c53-0d3f1c8e2a10")
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_hierarchy_endpoints() {
        let server = server_with(puno_store());

        let provinces: Value = server
            .get("/api/localities/hierarchy/provinces")
            .add_query_param("department", "Puno")
            .await
            .json();
        assert_eq!(provinces["data"], json!(["CHUCUITO", "EL COLLAO", "Puno"]));

        let response = server.get("/api/localities/hierarchy/districts").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resolve_twice_returns_existing() {
        let store = puno_store();
        let server = server_with(store.clone());
        let name: String = CityName().fake();

        let first: Value = server
            .post("/api/localities/resolve")
            .json(&json!({ "name": name, "provenance": "route_extraction", "reference": "R-12" }))
            .await
            .json();
        let second: Value = server
            .post("/api/localities/resolve")
            .json(&json!({ "name": name.to_uppercase() }))
            .await
            .json();

        assert_eq!(first["data"]["isNew"], true);
        assert_eq!(second["data"]["isNew"], false);
        assert_eq!(first["data"]["id"], second["data"]["id"]);
        assert_eq!(store.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_reports_per_item_results() {
        let server = server_with(puno_store());

        let response = server
            .post("/api/localities/resolve/batch")
            .json(&json!({
                "candidates": [{ "name": "" }, { "name": "Juli" }, { "name": "Zepita", "district": "ZEPITA" }]
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["data"]["failed"], 1);
        assert_eq!(body["data"]["succeeded"], 2);
        assert!(body["data"]["results"][0]["error"].is_string());
        assert_eq!(body["data"]["results"][1]["resolved"]["isNew"], false);
        assert_eq!(body["data"]["results"][2]["resolved"]["isNew"], true);
    }

    #[tokio::test]
    async fn test_duplicates_and_consolidation() {
        let store = puno_store();
        let first = record("Desaguadero", AdministrativeType::District, Some("PUNO"), None, None);
        let second = record("desaguadero", AdministrativeType::District, Some("PUNO"), None, None);
        let (id1, id2) = (first.id, second.id);
        store.push(first);
        store.push(second);
        let server = server_with(store);

        let duplicates: Value = server.get("/api/localities/duplicates").await.json();
        assert_eq!(duplicates["data"][0]["normalizedName"], "DESAGUADERO");
        assert_eq!(duplicates["data"][0]["ids"], json!([id1, id2]));

        let consolidated: Value = server
            .post("/api/localities/duplicates/consolidate")
            .json(&json!({ "ids": [id1, id2] }))
            .await
            .json();
        assert_eq!(consolidated["data"]["canonicalId"], json!(id1));
        assert_eq!(consolidated["data"]["removedIds"], json!([id2]));

        let duplicates: Value = server.get("/api/localities/duplicates").await.json();
        assert_eq!(duplicates["meta"]["total"], 0);
    }

    #[tokio::test]
    async fn test_catalog_status_reports_placeholder_when_store_is_down() {
        let store = puno_store();
        store.set_failing(true);
        let server = server_with(store.clone());

        let refreshed: Value = server.post("/api/localities/catalog/refresh").await.json();
        assert_eq!(refreshed["data"]["source"], "placeholder");
        assert!(refreshed["data"]["lastError"].is_string());

        store.set_failing(false);
        let refreshed: Value = server.post("/api/localities/catalog/refresh").await.json();
        assert_eq!(refreshed["data"]["source"], "store");
        assert_eq!(refreshed["data"]["size"], 3);

        let status: Value = server.get("/api/localities/catalog/status").await.json();
        assert_eq!(status["data"]["refreshCount"], 1);
        assert_eq!(status["data"]["stale"], false);
    }
}
