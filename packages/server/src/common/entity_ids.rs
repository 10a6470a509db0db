//! Typed ID definitions for all domain entities.
//!
//! This module defines type aliases for each domain entity, providing
//! compile-time type safety for ID usage throughout the application.
//!
//! # Example
//!
//! ```rust
//! use server_core::common::{ListingId, JobId};
//!
//! // These are incompatible types - compiler prevents mixing them up
//! let listing_id: ListingId = ListingId::new();
//! let job_id: JobId = JobId::new();
//!
//! // This would be a compile error:
//! // let wrong: JobId = listing_id;
//! ```

// Re-export the core Id type and version markers
pub use super::id::{Id, V4, V7};

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Listing entities (car wash locations).
pub struct Listing;

/// Marker type for Vendor entities (chains/brands).
pub struct Vendor;

/// Marker type for EnrichmentJob entities (one run of a job family).
pub struct EnrichmentJob;

/// Marker type for EnrichmentTask entities (one unit of work in a job).
pub struct EnrichmentTask;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for Listing entities.
pub type ListingId = Id<Listing>;

/// Typed ID for Vendor entities.
pub type VendorId = Id<Vendor>;

/// Typed ID for EnrichmentJob entities.
pub type JobId = Id<EnrichmentJob>;

/// Typed ID for EnrichmentTask entities.
pub type TaskId = Id<EnrichmentTask>;
