//! Vendors domain: chains/brands attached to listings.

pub mod models;

pub use models::Vendor;
