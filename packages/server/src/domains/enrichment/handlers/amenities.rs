//! Amenity backfill: scrape, extract amenities, union into the listing.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::common::ListingId;
use crate::domains::listings::models::Listing;
use crate::domains::listings::reconcile::merge_amenities;
use crate::kernel::{ContentBlock, ScrapeOptions, ServerKernel};

use super::super::models::JobKind;
use super::super::prompts::{parse_amenities, AMENITIES_SYSTEM};
use super::super::registry::{EnrichmentHandler, TaskOutcome};
use super::classify::crawl_status_for;

pub struct AmenitiesHandler;

#[async_trait]
impl EnrichmentHandler for AmenitiesHandler {
    fn kind(&self) -> JobKind {
        JobKind::AmenityBackfill
    }

    async fn targets(&self, kernel: &ServerKernel) -> Result<Vec<Uuid>> {
        Listing::ids_with_website(&kernel.db_pool).await
    }

    async fn process(&self, target_id: Uuid, kernel: &ServerKernel) -> Result<TaskOutcome> {
        let listing = Listing::find_by_id(ListingId::from_uuid(target_id), &kernel.db_pool)
            .await
            .context("Listing not found")?;

        let Some(website) = listing.website.as_deref() else {
            return Ok(TaskOutcome::skipped("no_website"));
        };

        let options = ScrapeOptions {
            timeout_ms: kernel.enrichment.scrape_timeout.as_millis() as u64,
            ..ScrapeOptions::default()
        };
        let page = match kernel.scraper.scrape(website, &options).await {
            Ok(page) => page,
            Err(err) => {
                let (status, is_failure) = crawl_status_for(&err);
                if is_failure {
                    return Err(anyhow!(err).context(format!("Scrape failed for {}", website)));
                }
                return Ok(TaskOutcome::skipped(&status.to_string()));
            }
        };

        let raw = kernel
            .classifier
            .complete(
                AMENITIES_SYSTEM,
                vec![ContentBlock::text(format!(
                    "Business: {}\n\nWebsite content:\n{}",
                    listing.name, page.markdown
                ))],
            )
            .await
            .context("Classifier call failed")?;

        let found = parse_amenities(&raw)?;
        let (merged, added) = merge_amenities(&listing.amenities, &found.amenities);

        if !added {
            return Ok(TaskOutcome::unchanged());
        }

        Listing::save_amenities(listing.id, &merged, &kernel.db_pool).await?;
        Ok(TaskOutcome::changed(json!({
            "amenities": merged,
        })))
    }
}
