//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::enrichment::{build_registry, JobManager};
use crate::kernel::{
    AnthropicClient, BaseClassifier, BaseImageStore, BaseWebScraper, FirecrawlClient,
    NoopImageStore, ServerKernel, StorageClient,
};
use crate::server::middleware::admin_auth_middleware;
use crate::server::routes::{
    classify_listing_handler, health_handler, job_control_handler, job_status_handler,
    job_stream_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub kernel: Arc<ServerKernel>,
    pub manager: Arc<JobManager>,
}

/// Build the Axum application router with real external clients.
pub fn build_app(pool: PgPool, config: &Config) -> Result<Router> {
    let scraper: Arc<dyn BaseWebScraper> = Arc::new(
        FirecrawlClient::new(config.firecrawl_api_key.clone())
            .map_err(|e| anyhow!("Failed to create scrape client: {}", e))?,
    );
    let classifier: Arc<dyn BaseClassifier> = Arc::new(AnthropicClient::new(
        config.anthropic_api_key.clone(),
        config.enrichment.model.clone(),
    )?);
    let image_store: Arc<dyn BaseImageStore> =
        match (config.storage_url.clone(), config.storage_api_key.clone()) {
            (Some(url), Some(key)) => Arc::new(StorageClient::new(
                url,
                key,
                config.storage_bucket.clone(),
            )?),
            _ => {
                tracing::warn!("no object storage configured, photo rehosting disabled");
                Arc::new(NoopImageStore)
            }
        };

    let kernel = Arc::new(ServerKernel::new(
        pool.clone(),
        scraper,
        classifier,
        image_store,
        config.enrichment.clone(),
    ));

    Ok(build_router(
        pool,
        kernel,
        config.admin_api_token.clone(),
    ))
}

/// Router wiring, separated so tests can inject a kernel with fakes.
pub fn build_router(pool: PgPool, kernel: Arc<ServerKernel>, admin_token: String) -> Router {
    let registry = Arc::new(build_registry());
    let manager = Arc::new(JobManager::new(kernel.clone(), registry));

    let state = AppState {
        db_pool: pool,
        kernel,
        manager,
    };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let admin_token = Arc::new(admin_token);
    let admin_routes = Router::new()
        .route("/api/enrichment/jobs", post(job_control_handler))
        .route("/api/enrichment/jobs/:id", get(job_status_handler))
        .route("/api/enrichment/jobs/:id/stream", get(job_stream_handler))
        .route("/api/listings/:id/classify", post(classify_listing_handler))
        .layer(middleware::from_fn(move |req, next| {
            admin_auth_middleware(admin_token.clone(), req, next)
        }));

    Router::new()
        .merge(admin_routes)
        // Health check stays open
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
