// ServerKernel - core infrastructure with all dependencies
//
// The ServerKernel holds all server dependencies (database, external APIs,
// streaming hub) and provides access via traits for testability. Enrichment
// tuning lives here too — handlers never read the environment at call sites.

use sqlx::PgPool;
use std::sync::Arc;

use super::{BaseClassifier, BaseImageStore, BaseWebScraper, StreamHub};
use crate::config::EnrichmentConfig;

/// ServerKernel holds all server dependencies
pub struct ServerKernel {
    pub db_pool: PgPool,
    pub scraper: Arc<dyn BaseWebScraper>,
    pub classifier: Arc<dyn BaseClassifier>,
    pub image_store: Arc<dyn BaseImageStore>,
    /// Shared hub for streaming job progress to SSE clients
    pub stream_hub: StreamHub,
    pub enrichment: EnrichmentConfig,
}

impl ServerKernel {
    /// Creates a new ServerKernel with the given dependencies
    pub fn new(
        db_pool: PgPool,
        scraper: Arc<dyn BaseWebScraper>,
        classifier: Arc<dyn BaseClassifier>,
        image_store: Arc<dyn BaseImageStore>,
        enrichment: EnrichmentConfig,
    ) -> Self {
        Self {
            db_pool,
            scraper,
            classifier,
            image_store,
            stream_hub: StreamHub::new(),
            enrichment,
        }
    }
}
