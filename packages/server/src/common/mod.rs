//! Shared primitives: typed IDs and JSON extraction.

pub mod entity_ids;
pub mod id;
pub mod json_extract;

pub use entity_ids::{JobId, ListingId, TaskId, VendorId};
pub use json_extract::{extract_json, JsonExtractError};
