pub mod enrichment;
pub mod listings;
pub mod vendors;
