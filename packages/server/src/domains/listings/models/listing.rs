use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::ListingId;

/// Listing - one car wash location, the long-lived record being enriched
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: ListingId,

    // Identity
    pub name: String,
    pub address: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: Option<String>,

    // Contact
    pub website: Option<String>,
    pub phone: Option<String>,

    // Classification state
    pub is_touchless: Option<bool>,
    pub touchless_evidence: Option<String>,
    pub crawl_status: CrawlStatus,

    // Derived content
    pub amenities: Vec<String>,
    pub hours: Option<serde_json::Value>,
    pub photos: Vec<String>,
    pub hero_image: Option<String>,
    pub vendor_name: Option<String>,
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of the last crawl attempt against the listing's website.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default,
)]
#[sqlx(type_name = "crawl_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    /// Not yet crawled
    #[default]
    Pending,
    /// Crawled and classified
    Crawled,
    /// Listing has no website to crawl (terminal, not a failure)
    NoWebsite,
    /// Fetch timed out or returned an error status
    FetchFailed,
    /// Page fetched but had no usable content
    NoContent,
    /// Site redirected away (parked domains, brand consolidation)
    Redirect,
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlStatus::Pending => write!(f, "pending"),
            CrawlStatus::Crawled => write!(f, "crawled"),
            CrawlStatus::NoWebsite => write!(f, "no_website"),
            CrawlStatus::FetchFailed => write!(f, "fetch_failed"),
            CrawlStatus::NoContent => write!(f, "no_content"),
            CrawlStatus::Redirect => write!(f, "redirect"),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Listing {
    /// Find listing by ID
    pub async fn find_by_id(id: ListingId, pool: &PgPool) -> Result<Self> {
        let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(listing)
    }

    /// IDs of listings never classified, in the stable (state, city, id)
    /// order that makes fan-out deterministic across reruns.
    pub async fn unclassified_ids(pool: &PgPool) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM listings
             WHERE is_touchless IS NULL AND crawl_status = 'pending'
             ORDER BY state, city, id",
        )
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// IDs of listings with a website, for content-driven backfills
    /// (amenities, descriptions, hero photos).
    pub async fn ids_with_website(pool: &PgPool) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM listings
             WHERE website IS NOT NULL
             ORDER BY state, city, id",
        )
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// IDs of listings with a website but no description yet.
    pub async fn ids_missing_description(pool: &PgPool) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM listings
             WHERE website IS NOT NULL
               AND (description IS NULL OR description = '')
             ORDER BY state, city, id",
        )
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// IDs of listings with a website but no hero image yet.
    pub async fn ids_missing_hero(pool: &PgPool) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM listings
             WHERE website IS NOT NULL
               AND (hero_image IS NULL OR hero_image = '')
             ORDER BY state, city, id",
        )
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// Listings belonging to a vendor (by stored vendor name).
    pub async fn find_by_vendor_name(name: &str, pool: &PgPool) -> Result<Vec<Self>> {
        let listings = sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE vendor_name = $1 ORDER BY state, city, id",
        )
        .bind(name)
        .fetch_all(pool)
        .await?;
        Ok(listings)
    }

    /// Record the crawl outcome without touching classification fields.
    pub async fn set_crawl_status(
        id: ListingId,
        status: CrawlStatus,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query("UPDATE listings SET crawl_status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Persist reconciled classification fields in one statement.
    ///
    /// Callers must have already run the values through the reconciliation
    /// layer — this method writes exactly what it is given.
    pub async fn save_classification(
        id: ListingId,
        is_touchless: Option<bool>,
        evidence: Option<&str>,
        amenities: &[String],
        hours: Option<&serde_json::Value>,
        crawl_status: CrawlStatus,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE listings
             SET is_touchless = $1,
                 touchless_evidence = $2,
                 amenities = $3,
                 hours = $4,
                 crawl_status = $5,
                 updated_at = NOW()
             WHERE id = $6",
        )
        .bind(is_touchless)
        .bind(evidence)
        .bind(amenities)
        .bind(hours)
        .bind(crawl_status)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Persist reconciled amenity set.
    pub async fn save_amenities(id: ListingId, amenities: &[String], pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE listings SET amenities = $1, updated_at = NOW() WHERE id = $2")
            .bind(amenities)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Persist reconciled photo fields.
    pub async fn save_photos(
        id: ListingId,
        hero_image: Option<&str>,
        photos: &[String],
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE listings SET hero_image = $1, photos = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(hero_image)
        .bind(photos)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Persist a generated description (reconciled fill-if-empty upstream).
    pub async fn save_description(id: ListingId, description: &str, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE listings SET description = $1, updated_at = NOW() WHERE id = $2")
            .bind(description)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Fill a missing website URL (chain backfill). Guarded in SQL so a
    /// concurrent writer can never be clobbered.
    pub async fn fill_website(id: ListingId, website: &str, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE listings SET website = $1, updated_at = NOW()
             WHERE id = $2 AND website IS NULL",
        )
        .bind(website)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rename the vendor on all of a vendor's listings.
    pub async fn rename_vendor(old: &str, new: &str, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE listings SET vendor_name = $1, updated_at = NOW() WHERE vendor_name = $2",
        )
        .bind(new)
        .bind(old)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
