mod core;
mod features;
mod shared;

use crate::core::config::{Config, StoreBackend};
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::localities::routes as localities_routes;
use crate::features::localities::services::{
    CatalogCache, CatalogEvent, DegradedModeProvider, DegradedServing, LocalityService,
    NoPlaceholder, PlaceholderCatalog, UniquenessResolver,
};
use crate::features::localities::stores::{HttpLocalityStore, LocalityStore, PgLocalityStore};
use axum::{extract::DefaultBodyLimit, middleware::from_fn, Router};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

/// Connects the configured locality store adapter
async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn LocalityStore>> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let db_config = config
                .store
                .database
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Database configuration missing"))?;

            let pool = database::create_pool(db_config).await?;
            tracing::info!("Database connection pool created");

            tracing::info!("Running database migrations...");
            database::run_migrations(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
            tracing::info!("Database migrations completed successfully");

            Ok(Arc::new(PgLocalityStore::new(pool)))
        }
        StoreBackend::Http => {
            let http_config = config
                .store
                .http
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Locality API configuration missing"))?;

            let store = HttpLocalityStore::new(http_config)
                .map_err(|e| anyhow::anyhow!("Failed to initialize locality API client: {}", e))?;
            tracing::info!("Using upstream locality API at {}", http_config.base_url);

            Ok(Arc::new(store))
        }
    }
}

/// Logs catalog refreshes and degraded-mode transitions until the cache is dropped
fn spawn_catalog_event_logger(cache: &CatalogCache) {
    let mut events = cache.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(CatalogEvent::Refreshed { count }) => {
                    tracing::debug!("Catalog event: refreshed with {} localities", count);
                }
                Ok(CatalogEvent::RefreshFailed { serving, message }) => match serving {
                    DegradedServing::Stale => {
                        tracing::warn!("Catalog event: serving stale data ({})", message)
                    }
                    DegradedServing::Placeholder => {
                        tracing::error!("Catalog event: serving placeholder data ({})", message)
                    }
                    DegradedServing::Empty => {
                        tracing::error!("Catalog event: catalog is empty ({})", message)
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Catalog event logger skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: tokio_worker_threads={}, pid={}, store={:?}",
        worker_threads,
        std::process::id(),
        config.store.backend
    );
    tracing::info!("Configuration loaded successfully");

    let store = connect_store(&config).await?;

    // Catalog cache, shared by every locality service
    let fallback: Arc<dyn DegradedModeProvider> = if config.catalog.placeholder_fallback {
        Arc::new(PlaceholderCatalog)
    } else {
        Arc::new(NoPlaceholder)
    };
    let catalog_cache = Arc::new(CatalogCache::new(
        Arc::clone(&store),
        fallback,
        config.catalog.ttl,
    ));
    spawn_catalog_event_logger(&catalog_cache);

    // Warm the catalog so the first request does not pay for the fetch
    let snapshot = catalog_cache.get(false).await;
    tracing::info!(
        "Locality catalog initialized: {} localities (source={:?}, ttl={}s)",
        snapshot.localities().len(),
        snapshot.source(),
        config.catalog.ttl.as_secs()
    );

    let locality_service = Arc::new(LocalityService::new(
        Arc::clone(&catalog_cache),
        Arc::clone(&store),
    ));
    let uniqueness_resolver = Arc::new(UniquenessResolver::new(
        Arc::clone(&catalog_cache),
        Arc::clone(&store),
    ));
    tracing::info!("Locality services initialized");

    // Build OpenAPI with config-driven info
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    // Build swagger router
    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn(middleware::basic_auth_middleware(Arc::new(
                credentials,
            ))))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Simple health check endpoint
    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    let app = Router::new()
        .merge(swagger)
        .merge(localities_routes::routes(
            locality_service,
            uniqueness_resolver,
        ))
        .merge(health_route)
        .layer(DefaultBodyLimit::max(config.app.max_request_body_size))
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;

    let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
    socket.set_tcp_keepalive(&keepalive)?;

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
