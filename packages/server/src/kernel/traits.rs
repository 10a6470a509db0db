// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "classify this listing") should be domain functions
// that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseWebScraper)

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Web Scraper Trait (Infrastructure - page fetching)
// =============================================================================

/// Options for a single scrape call.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Formats to request ("markdown", "images", "links")
    pub formats: Vec<String>,
    /// Strip navigation/boilerplate and return main content only
    pub only_main_content: bool,
    /// Wait for JS-rendered content before capturing (milliseconds)
    pub wait_for_ms: Option<u64>,
    /// Hard upper bound on the remote call (milliseconds)
    pub timeout_ms: u64,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            formats: vec!["markdown".to_string()],
            only_main_content: true,
            wait_for_ms: None,
            timeout_ms: 30_000,
        }
    }
}

impl ScrapeOptions {
    /// Markdown plus page images (hero-photo candidates).
    pub fn with_images(mut self) -> Self {
        self.formats.push("images".to_string());
        self
    }
}

/// A successfully scraped page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub markdown: String,
    pub images: Vec<String>,
    pub links: Vec<String>,
    pub status_code: u16,
}

/// Typed scrape failures.
///
/// These map onto the listing's `crawl_status` taxonomy — a batch of
/// thousands of listings cannot let one bad website abort the chunk, so
/// every remote failure mode gets a variant instead of an opaque error.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("scrape timed out")]
    Timeout,
    #[error("fetch returned HTTP {status}")]
    Http { status: u16 },
    #[error("page had no usable content")]
    NoContent,
    #[error("site redirected to {location}")]
    Redirect { location: String },
    #[error("scraping service rejected the site: {0}")]
    Unsupported(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait BaseWebScraper: Send + Sync {
    /// Fetch a single page.
    async fn scrape(&self, url: &str, options: &ScrapeOptions)
        -> Result<ScrapedPage, ScrapeError>;

    /// Discover up to `limit` URLs under a site (chain-location discovery).
    async fn map_site(&self, url: &str, limit: usize) -> Result<Vec<String>, ScrapeError>;

    /// Fetch raw bytes (candidate images for classification and rehosting).
    /// Returns the bytes and the response content type.
    async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, String), ScrapeError>;
}

// =============================================================================
// Classifier Trait (Infrastructure - LLM completion)
// =============================================================================

/// One block of classifier input: text or a base64-encoded image.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    Image {
        media_type: String,
        data_base64: String,
    },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text(s.into())
    }
}

#[async_trait]
pub trait BaseClassifier: Send + Sync {
    /// Run one completion. Returns the raw model text; callers extract a
    /// typed JSON verdict with `common::json_extract`.
    async fn complete(&self, system: &str, blocks: Vec<ContentBlock>) -> Result<String>;
}

// =============================================================================
// Image Store Trait (Infrastructure - photo rehosting)
// =============================================================================

#[async_trait]
pub trait BaseImageStore: Send + Sync {
    /// Upload bytes to owned storage, returning the public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}
