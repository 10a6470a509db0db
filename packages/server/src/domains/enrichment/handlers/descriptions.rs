//! Description generation: write a short factual blurb for listings that
//! have none. Fill-if-empty; an admin-written description is never replaced.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::common::ListingId;
use crate::domains::listings::models::Listing;
use crate::domains::listings::reconcile::{fill_description, FieldWrite};
use crate::kernel::{ContentBlock, ScrapeOptions, ServerKernel};

use super::super::models::JobKind;
use super::super::prompts::{parse_description, DESCRIPTION_SYSTEM};
use super::super::registry::{EnrichmentHandler, TaskOutcome};

pub struct DescriptionsHandler;

#[async_trait]
impl EnrichmentHandler for DescriptionsHandler {
    fn kind(&self) -> JobKind {
        JobKind::DescriptionGeneration
    }

    async fn targets(&self, kernel: &ServerKernel) -> Result<Vec<Uuid>> {
        Listing::ids_missing_description(&kernel.db_pool).await
    }

    async fn process(&self, target_id: Uuid, kernel: &ServerKernel) -> Result<TaskOutcome> {
        let listing = Listing::find_by_id(ListingId::from_uuid(target_id), &kernel.db_pool)
            .await
            .context("Listing not found")?;

        // A description may have appeared since fan-out
        if listing
            .description
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false)
        {
            return Ok(TaskOutcome::skipped("already_described"));
        }

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
                let (status, is_failure) = super::classify::crawl_status_for(&err);
                if is_failure {
                    return Err(anyhow!(err).context(format!("Scrape failed for {}", website)));
                }
                return Ok(TaskOutcome::skipped(&status.to_string()));
            }
        };

        let raw = kernel
            .classifier
            .complete(
                DESCRIPTION_SYSTEM,
                vec![ContentBlock::text(format!(
                    "Business: {} in {}, {}\n\nWebsite content:\n{}",
                    listing.name, listing.city, listing.state, page.markdown
                ))],
            )
            .await
            .context("Classifier call failed")?;

        let verdict = parse_description(&raw)?;

        let FieldWrite::Set(description) =
            fill_description(listing.description.as_deref(), &verdict.description)
        else {
            return Ok(TaskOutcome::unchanged());
        };

        Listing::save_description(listing.id, &description, &kernel.db_pool).await?;
        Ok(TaskOutcome::changed(json!({ "description": description })))
    }
}
