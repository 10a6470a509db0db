//! Touchless classification: scrape the listing's website, ask the
//! classifier for a verdict, gap-fill the listing.
//!
//! Batch runs never overwrite an existing verdict. The one-shot re-check
//! path (`classify_one`, used by the single-listing endpoint) passes `force`
//! and always writes.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::common::ListingId;
use crate::domains::listings::models::{CrawlStatus, Listing};
use crate::domains::listings::reconcile::{
    fill_evidence, fill_hours, fill_touchless, merge_amenities, FieldWrite,
};
use crate::kernel::{ContentBlock, ScrapeError, ScrapeOptions, ServerKernel};

use super::super::models::JobKind;
use super::super::prompts::{parse_touchless, touchless_input, TouchlessVerdict, TOUCHLESS_SYSTEM};
use super::super::registry::{EnrichmentHandler, TaskOutcome};

pub struct ClassifyHandler;

#[async_trait]
impl EnrichmentHandler for ClassifyHandler {
    fn kind(&self) -> JobKind {
        JobKind::Classification
    }

    async fn targets(&self, kernel: &ServerKernel) -> Result<Vec<Uuid>> {
        Listing::unclassified_ids(&kernel.db_pool).await
    }

    async fn process(&self, target_id: Uuid, kernel: &ServerKernel) -> Result<TaskOutcome> {
        let listing = Listing::find_by_id(ListingId::from_uuid(target_id), &kernel.db_pool)
            .await
            .context("Listing not found")?;
        classify_listing(&listing, kernel, false).await
    }
}

/// One-shot re-check of a single listing, bypassing the gap-fill guard.
pub async fn classify_one(listing_id: ListingId, kernel: &ServerKernel) -> Result<Listing> {
    let listing = Listing::find_by_id(listing_id, &kernel.db_pool)
        .await
        .context("Listing not found")?;
    classify_listing(&listing, kernel, true).await?;
    Listing::find_by_id(listing_id, &kernel.db_pool).await
}

pub(crate) async fn classify_listing(
    listing: &Listing,
    kernel: &ServerKernel,
    force: bool,
) -> Result<TaskOutcome> {
    let Some(website) = listing.website.as_deref() else {
        // Not a failure: there is simply nothing to crawl
        Listing::set_crawl_status(listing.id, CrawlStatus::NoWebsite, &kernel.db_pool).await?;
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
            Listing::set_crawl_status(listing.id, status, &kernel.db_pool).await?;
            if is_failure {
                return Err(anyhow!(err).context(format!("Scrape failed for {}", website)));
            }
            return Ok(TaskOutcome::skipped(&status.to_string()));
        }
    };

    let raw = kernel
        .classifier
        .complete(
            TOUCHLESS_SYSTEM,
            vec![ContentBlock::text(touchless_input(
                &listing.name,
                &page.markdown,
            ))],
        )
        .await
        .context("Classifier call failed")?;

    // Raw output is preserved in the extraction error for debugging
    let verdict = parse_touchless(&raw)?;
    let write = reconcile_verdict(listing, &verdict, force);

    Listing::save_classification(
        listing.id,
        write.is_touchless,
        write.evidence.as_deref(),
        &write.amenities,
        write.hours.as_ref(),
        CrawlStatus::Crawled,
        &kernel.db_pool,
    )
    .await?;

    let result = json!({
        "is_touchless": verdict.is_touchless,
        "evidence": verdict.evidence,
        "amenities_added": write.amenities_added,
    });
    Ok(TaskOutcome {
        changed: write.changed,
        result: Some(result),
    })
}

/// Map a scrape failure onto the listing's crawl status. The bool says
/// whether the task counts as failed (transient fetch problems) or done
/// (terminal page conditions like redirects and empty content).
pub(crate) fn crawl_status_for(err: &ScrapeError) -> (CrawlStatus, bool) {
    match err {
        ScrapeError::Timeout
        | ScrapeError::Http { .. }
        | ScrapeError::Transport(_)
        | ScrapeError::Unsupported(_) => (CrawlStatus::FetchFailed, true),
        ScrapeError::NoContent => (CrawlStatus::NoContent, false),
        ScrapeError::Redirect { .. } => (CrawlStatus::Redirect, false),
    }
}

pub(crate) struct ClassificationWrite {
    pub is_touchless: Option<bool>,
    pub evidence: Option<String>,
    pub amenities: Vec<String>,
    pub hours: Option<Value>,
    pub amenities_added: bool,
    pub changed: bool,
}

/// Pure reconciliation of a verdict against the listing's current state.
pub(crate) fn reconcile_verdict(
    listing: &Listing,
    verdict: &TouchlessVerdict,
    force: bool,
) -> ClassificationWrite {
    let touchless = fill_touchless(listing.is_touchless, verdict.is_touchless, force);
    let verdict_written = touchless.is_set();

    let evidence = match fill_evidence(&verdict.evidence, verdict_written) {
        FieldWrite::Set(e) => Some(e),
        FieldWrite::Keep => listing.touchless_evidence.clone(),
    };

    let (amenities, amenities_added) = merge_amenities(&listing.amenities, &verdict.amenities);

    let proposed_hours = verdict
        .hours
        .as_ref()
        .and_then(|h| serde_json::to_value(h).ok());
    let hours_write = fill_hours(listing.hours.as_ref(), proposed_hours);
    let hours_written = hours_write.is_set();
    let hours = match hours_write {
        FieldWrite::Set(v) => Some(v),
        FieldWrite::Keep => listing.hours.clone(),
    };

    let changed = verdict_written || amenities_added || hours_written;

    ClassificationWrite {
        is_touchless: touchless.resolve(listing.is_touchless),
        evidence,
        amenities,
        hours,
        amenities_added,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_listing() -> Listing {
        Listing {
            id: ListingId::new(),
            name: "Sparkle Wash".to_string(),
            address: None,
            city: "Duluth".to_string(),
            state: "MN".to_string(),
            zip: None,
            website: Some("https://sparkle.example".to_string()),
            phone: None,
            is_touchless: None,
            touchless_evidence: None,
            crawl_status: CrawlStatus::Pending,
            amenities: vec![],
            hours: None,
            photos: vec![],
            hero_image: None,
            vendor_name: None,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn verdict(is_touchless: Option<bool>) -> TouchlessVerdict {
        TouchlessVerdict {
            is_touchless,
            evidence: "laser wash".to_string(),
            amenities: vec!["free vacuums".to_string()],
            hours: None,
        }
    }

    #[test]
    fn verdict_fills_unset_listing() {
        let listing = sample_listing();
        let write = reconcile_verdict(&listing, &verdict(Some(true)), false);
        assert_eq!(write.is_touchless, Some(true));
        assert_eq!(write.evidence.as_deref(), Some("laser wash"));
        assert!(write.changed);
    }

    #[test]
    fn verdict_never_flips_existing_value() {
        let mut listing = sample_listing();
        listing.is_touchless = Some(true);
        listing.amenities = vec!["free vacuums".to_string()];

        let write = reconcile_verdict(&listing, &verdict(Some(false)), false);
        assert_eq!(write.is_touchless, Some(true));
        assert!(write.evidence.is_none());
        assert!(!write.changed);
    }

    #[test]
    fn force_overwrites_existing_value() {
        let mut listing = sample_listing();
        listing.is_touchless = Some(true);

        let write = reconcile_verdict(&listing, &verdict(Some(false)), true);
        assert_eq!(write.is_touchless, Some(false));
        assert!(write.changed);
    }

    #[test]
    fn null_verdict_leaves_listing_unclassified() {
        let listing = sample_listing();
        let mut v = verdict(None);
        v.amenities = vec![];
        v.evidence = String::new();

        let write = reconcile_verdict(&listing, &v, false);
        assert_eq!(write.is_touchless, None);
        assert!(!write.changed);
    }

    #[test]
    fn transient_scrape_failures_are_task_failures() {
        assert_eq!(
            crawl_status_for(&ScrapeError::Timeout),
            (CrawlStatus::FetchFailed, true)
        );
        assert_eq!(
            crawl_status_for(&ScrapeError::Http { status: 503 }),
            (CrawlStatus::FetchFailed, true)
        );
    }

    #[test]
    fn terminal_page_conditions_complete_the_task() {
        assert_eq!(
            crawl_status_for(&ScrapeError::NoContent),
            (CrawlStatus::NoContent, false)
        );
        let redirect = ScrapeError::Redirect {
            location: "https://brand.example".to_string(),
        };
        assert_eq!(crawl_status_for(&redirect), (CrawlStatus::Redirect, false));
    }
}
