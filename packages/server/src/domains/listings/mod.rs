//! Listings domain: the car wash records being enriched, and the
//! reconciliation rules every pipeline write goes through.

pub mod models;
pub mod reconcile;

pub use models::{CrawlStatus, Listing};
