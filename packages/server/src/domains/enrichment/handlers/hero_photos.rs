//! Hero-photo selection: collect candidate images from the listing's site,
//! let the classifier pick a real photograph, rehost approved images.
//!
//! Rehosting failure falls back to the source URL — a photo is never dropped
//! because storage rejected it.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use uuid::Uuid;

use crate::common::ListingId;
use crate::domains::listings::models::Listing;
use crate::domains::listings::reconcile::{append_photos, fill_hero, FieldWrite};
use crate::kernel::{content_path, ContentBlock, ScrapeOptions, ServerKernel};

use super::super::models::JobKind;
use super::super::prompts::{parse_hero_photo, HERO_PHOTO_SYSTEM};
use super::super::registry::{EnrichmentHandler, TaskOutcome};
use super::classify::crawl_status_for;

pub struct HeroPhotosHandler;

#[async_trait]
impl EnrichmentHandler for HeroPhotosHandler {
    fn kind(&self) -> JobKind {
        JobKind::HeroPhotoSelection
    }

    async fn targets(&self, kernel: &ServerKernel) -> Result<Vec<Uuid>> {
        Listing::ids_missing_hero(&kernel.db_pool).await
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
        }
        .with_images();

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

        // Download candidates; an image that will not fetch cannot be judged
        // or rehosted, so it is silently skipped.
        let mut candidates: Vec<(String, Vec<u8>, String)> = Vec::new();
        for url in page
            .images
            .iter()
            .take(kernel.enrichment.max_candidate_images)
        {
            match kernel.scraper.fetch_bytes(url).await {
                Ok((bytes, content_type)) if content_type.starts_with("image/") => {
                    candidates.push((url.clone(), bytes, content_type));
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(url = %url, error = %err, "candidate image fetch failed");
                }
            }
        }

        if candidates.is_empty() {
            return Ok(TaskOutcome::skipped("no_candidate_images"));
        }

        let mut blocks = vec![ContentBlock::text(format!(
            "Candidate images for \"{}\" ({} total), in order starting at index 0:",
            listing.name,
            candidates.len()
        ))];
        for (i, (_, bytes, content_type)) in candidates.iter().enumerate() {
            blocks.push(ContentBlock::text(format!("Image {}:", i)));
            blocks.push(ContentBlock::Image {
                media_type: content_type.clone(),
                data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            });
        }

        let raw = kernel
            .classifier
            .complete(HERO_PHOTO_SYSTEM, blocks)
            .await
            .context("Classifier call failed")?;
        let verdict = parse_hero_photo(&raw)?;

        // Approved = not blocked. Approving nothing is a valid outcome.
        let approved: Vec<usize> = (0..candidates.len())
            .filter(|i| !verdict.blocked.contains(i))
            .collect();
        if approved.is_empty() {
            return Ok(TaskOutcome::skipped("all_images_blocked"));
        }

        let mut rehosted: Vec<(usize, String)> = Vec::new();
        for &i in &approved {
            let (source_url, bytes, content_type) = &candidates[i];
            let path = content_path(bytes, content_type);
            let url = match kernel
                .image_store
                .upload(&path, bytes.clone(), content_type)
                .await
            {
                Ok(public_url) => public_url,
                Err(err) => {
                    tracing::warn!(
                        listing_id = %listing.id,
                        source = %source_url,
                        error = %err,
                        "rehost failed, keeping source url"
                    );
                    source_url.clone()
                }
            };
            rehosted.push((i, url));
        }

        let hero_candidate = verdict
            .best_index
            .and_then(|best| rehosted.iter().find(|(i, _)| *i == best))
            .map(|(_, url)| url.as_str());

        let hero_write = fill_hero(listing.hero_image.as_deref(), hero_candidate);
        let new_photos: Vec<String> = rehosted.iter().map(|(_, url)| url.clone()).collect();
        let (photos, photos_added) = append_photos(&listing.photos, &new_photos);

        let hero_written = hero_write.is_set();
        if !hero_written && !photos_added {
            return Ok(TaskOutcome::unchanged());
        }

        let hero = match hero_write {
            FieldWrite::Set(url) => Some(url),
            FieldWrite::Keep => listing.hero_image.clone(),
        };
        Listing::save_photos(listing.id, hero.as_deref(), &photos, &kernel.db_pool).await?;

        Ok(TaskOutcome::changed(json!({
            "hero_image": hero,
            "photos_added": photos_added,
            "approved": approved.len(),
            "blocked": verdict.blocked.len(),
        })))
    }
}
