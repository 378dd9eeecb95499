mod candidate;
mod filter;
mod locality;

pub use candidate::{
    Consolidation, DuplicateGroup, LocalityCandidate, Provenance, ProvenanceKind,
    ResolvedLocality,
};
pub use filter::{DepartmentFilter, LocalityFilter, INCOMPLETE_LOCATION_SENTINEL};
pub use locality::{
    AdministrativeType, Coordinates, Locality, LocalityDraft, LocalityRecord, TerritorialLevel,
};
