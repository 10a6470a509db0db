//! One handler per enrichment job family.

pub mod amenities;
pub mod chain_urls;
pub mod classify;
pub mod descriptions;
pub mod hero_photos;
pub mod vendor_names;

use std::sync::Arc;

use super::registry::HandlerRegistry;

pub use classify::classify_one;

/// Build the registry with every job family's handler.
pub fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(classify::ClassifyHandler));
    registry.register(Arc::new(amenities::AmenitiesHandler));
    registry.register(Arc::new(vendor_names::VendorNamesHandler));
    registry.register(Arc::new(descriptions::DescriptionsHandler));
    registry.register(Arc::new(chain_urls::ChainUrlsHandler));
    registry.register(Arc::new(hero_photos::HeroPhotosHandler));
    registry
}
