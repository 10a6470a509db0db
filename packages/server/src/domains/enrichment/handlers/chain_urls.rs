//! Chain-URL backfill: discover a chain's location pages via site mapping
//! and fill missing listing websites by city/state match. Fill-only — an
//! existing website is never replaced (guarded again in SQL).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::common::VendorId;
use crate::domains::listings::models::Listing;
use crate::domains::vendors::models::Vendor;
use crate::kernel::ServerKernel;

use super::super::models::JobKind;
use super::super::registry::{EnrichmentHandler, TaskOutcome};

/// Upper bound on discovered links per chain domain.
const MAP_LIMIT: usize = 200;

pub struct ChainUrlsHandler;

#[async_trait]
impl EnrichmentHandler for ChainUrlsHandler {
    fn kind(&self) -> JobKind {
        JobKind::ChainUrlBackfill
    }

    async fn targets(&self, kernel: &ServerKernel) -> Result<Vec<Uuid>> {
        Vendor::ids_with_domain(&kernel.db_pool).await
    }

    async fn process(&self, target_id: Uuid, kernel: &ServerKernel) -> Result<TaskOutcome> {
        let vendor = Vendor::find_by_id(VendorId::from_uuid(target_id), &kernel.db_pool)
            .await
            .context("Vendor not found")?;

        let Some(domain) = vendor.domain.as_deref() else {
            return Ok(TaskOutcome::skipped("no_domain"));
        };

        let site_url = format!("https://{}", domain.trim_start_matches("https://").trim_start_matches("http://"));
        let links = kernel
            .scraper
            .map_site(&site_url, MAP_LIMIT)
            .await
            .map_err(|e| anyhow!(e).context(format!("Site map failed for {}", domain)))?;

        let listings = Listing::find_by_vendor_name(&vendor.name, &kernel.db_pool).await?;
        let mut filled = 0u64;
        let mut matched: Vec<serde_json::Value> = Vec::new();

        for listing in listings.iter().filter(|l| l.website.is_none()) {
            let Some(link) = match_location_link(&links, &listing.city, &listing.state) else {
                continue;
            };
            if Listing::fill_website(listing.id, link, &kernel.db_pool).await? {
                filled += 1;
                matched.push(json!({ "listing_id": listing.id, "website": link }));
            }
        }

        if filled == 0 {
            return Ok(TaskOutcome::unchanged());
        }
        Ok(TaskOutcome::changed(json!({
            "filled": filled,
            "matched": matched,
        })))
    }
}

/// Lowercase slug: runs of non-alphanumerics collapse to single hyphens.
fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_hyphen = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Pick the discovered link for a listing's city, preferring one whose path
/// also mentions the state. Matches on the URL path only so a city name in
/// the domain never counts, and returns None rather than guessing.
fn match_location_link<'a>(links: &'a [String], city: &str, state: &str) -> Option<&'a str> {
    let city_slug = slug(city);
    if city_slug.is_empty() {
        return None;
    }
    let state_slug = slug(state);

    let candidates: Vec<&String> = links
        .iter()
        .filter(|l| {
            url::Url::parse(l)
                .map(|u| u.path().to_lowercase().contains(&city_slug))
                .unwrap_or(false)
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }

    candidates
        .iter()
        .find(|l| {
            !state_slug.is_empty()
                && url::Url::parse(l)
                    .map(|u| u.path().to_lowercase().contains(&state_slug))
                    .unwrap_or(false)
        })
        .or(candidates.first())
        .map(|l| l.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(slug("St. Paul"), "st-paul");
        assert_eq!(slug("Coon Rapids"), "coon-rapids");
        assert_eq!(slug("MN"), "mn");
    }

    #[test]
    fn link_matching_requires_city() {
        let links = vec![
            "https://wash.example/locations/mn/st-paul".to_string(),
            "https://wash.example/locations/wi/madison".to_string(),
        ];
        assert_eq!(
            match_location_link(&links, "St. Paul", "MN"),
            Some("https://wash.example/locations/mn/st-paul")
        );
        assert_eq!(match_location_link(&links, "Duluth", "MN"), None);
    }

    #[test]
    fn link_matching_prefers_state_on_ambiguity() {
        let links = vec![
            "https://wash.example/wi/springfield".to_string(),
            "https://wash.example/mn/springfield".to_string(),
        ];
        assert_eq!(
            match_location_link(&links, "Springfield", "MN"),
            Some("https://wash.example/mn/springfield")
        );
    }
}
