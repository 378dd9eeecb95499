pub mod catalog_cache;
pub mod degraded_mode;
pub mod locality_service;
pub mod matcher;
pub mod uniqueness_resolver;

pub use catalog_cache::{
    CatalogCache, CatalogEvent, CatalogSnapshot, CatalogStatus, DegradedServing, SnapshotSource,
};
pub use degraded_mode::{DegradedModeProvider, NoPlaceholder, PlaceholderCatalog};
pub use locality_service::{LocalityService, RankedLocality};
pub use uniqueness_resolver::{BatchOutcome, UniquenessResolver};
