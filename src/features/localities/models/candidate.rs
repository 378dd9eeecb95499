use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Where an automatically resolved locality came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceKind {
    ManualEntry,
    BulkImport,
    RouteExtraction,
}

impl std::fmt::Display for ProvenanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvenanceKind::ManualEntry => write!(f, "manual entry"),
            ProvenanceKind::BulkImport => write!(f, "bulk import"),
            ProvenanceKind::RouteExtraction => write!(f, "route extraction"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub kind: ProvenanceKind,
    /// Source file, route code or similar
    pub reference: Option<String>,
}

/// A place name arriving from an import, to be resolved to a canonical id
#[derive(Debug, Clone, PartialEq)]
pub struct LocalityCandidate {
    pub name: String,
    pub department: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocality {
    pub id: Uuid,
    pub name: String,
    pub is_new: bool,
}

/// Localities sharing one normalized name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub normalized_name: String,
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consolidation {
    /// `None` when no ids were supplied
    pub canonical_id: Option<Uuid>,
    pub removed_ids: Vec<Uuid>,
}
