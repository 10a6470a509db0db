//! Vendor-name cleanup: ask the classifier for the canonical brand name and
//! propagate a rename to the vendor and its listings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::common::VendorId;
use crate::domains::listings::models::Listing;
use crate::domains::listings::reconcile::{rename_vendor, FieldWrite};
use crate::domains::vendors::models::Vendor;
use crate::kernel::{ContentBlock, ServerKernel};

use super::super::models::JobKind;
use super::super::prompts::{parse_vendor_name, vendor_name_input, VENDOR_NAME_SYSTEM};
use super::super::registry::{EnrichmentHandler, TaskOutcome};

/// How many of the vendor's listing names to show the classifier.
const SAMPLE_NAMES: usize = 5;

pub struct VendorNamesHandler;

#[async_trait]
impl EnrichmentHandler for VendorNamesHandler {
    fn kind(&self) -> JobKind {
        JobKind::VendorNameCleanup
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

        let samples: Vec<String> = Listing::find_by_vendor_name(&vendor.name, &kernel.db_pool)
            .await?
            .into_iter()
            .map(|l| l.name)
            .take(SAMPLE_NAMES)
            .collect();

        let raw = kernel
            .classifier
            .complete(
                VENDOR_NAME_SYSTEM,
                vec![ContentBlock::text(vendor_name_input(domain, &samples))],
            )
            .await
            .context("Classifier call failed")?;

        let verdict = parse_vendor_name(&raw)?;

        // An echoed-back unchanged name is success, not an error
        let FieldWrite::Set(new_name) = rename_vendor(&vendor.name, &verdict.name) else {
            return Ok(TaskOutcome {
                changed: false,
                result: Some(json!({
                    "old": vendor.name,
                    "new": verdict.name,
                    "changed": false,
                })),
            });
        };

        let old_name = Vendor::rename(vendor.id, &new_name, &kernel.db_pool).await?;
        let listings_updated = Listing::rename_vendor(&old_name, &new_name, &kernel.db_pool).await?;

        tracing::info!(
            vendor_id = %vendor.id,
            old = %old_name,
            new = %new_name,
            listings_updated,
            "vendor renamed"
        );

        Ok(TaskOutcome::changed(json!({
            "old": old_name,
            "new": new_name,
            "changed": true,
            "listings_updated": listings_updated,
        })))
    }
}
