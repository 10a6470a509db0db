pub mod listing;

pub use listing::{CrawlStatus, Listing};
