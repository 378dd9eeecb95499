use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use super::catalog_cache::{CatalogCache, CatalogSnapshot};
use crate::core::error::{AppError, Result};
use crate::features::localities::models::{
    AdministrativeType, Consolidation, DuplicateGroup, Locality, LocalityCandidate, LocalityDraft,
    ResolvedLocality, TerritorialLevel,
};
use crate::features::localities::stores::LocalityStore;
use crate::shared::text::identity_key;

/// Per-item result of a batch resolution
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub name: String,
    pub result: Result<ResolvedLocality>,
}

/// Maps free-form place names to canonical locality ids, creating new
/// localities for names the catalog has never seen.
pub struct UniquenessResolver {
    cache: Arc<CatalogCache>,
    store: Arc<dyn LocalityStore>,
}

/// Most specific parent present decides the rung of an auto-created locality
pub fn infer_administrative_type(candidate: &LocalityCandidate) -> AdministrativeType {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

    if present(&candidate.district) {
        AdministrativeType::District
    } else if present(&candidate.province) {
        AdministrativeType::Province
    } else if present(&candidate.department) {
        AdministrativeType::Department
    } else {
        AdministrativeType::PopulatedPlace
    }
}

/// Groups localities by identity key, keeping groups with more than one distinct id
pub fn group_duplicates(localities: &[Locality]) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<String, Vec<Uuid>> = BTreeMap::new();

    for locality in localities {
        let ids = groups.entry(identity_key(&locality.name)).or_default();
        if !ids.contains(&locality.id) {
            ids.push(locality.id);
        }
    }

    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(normalized_name, ids)| DuplicateGroup {
            normalized_name,
            ids,
        })
        .collect()
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn draft_for(candidate: &LocalityCandidate, name: &str) -> LocalityDraft {
    let administrative_type = infer_administrative_type(candidate);
    let provenance = &candidate.provenance;

    LocalityDraft {
        name: name.to_string(),
        administrative_type,
        territorial_level: TerritorialLevel::from(administrative_type),
        department: trimmed(&candidate.department),
        province: trimmed(&candidate.province),
        district: trimmed(&candidate.district),
        official_code: None,
        coordinates: None,
        description: Some(format!("Auto-registered from {}", provenance.kind)),
        observations: provenance
            .reference
            .as_deref()
            .map(|reference| format!("Source: {}", reference)),
        active: true,
    }
}

impl UniquenessResolver {
    pub fn new(cache: Arc<CatalogCache>, store: Arc<dyn LocalityStore>) -> Self {
        Self { cache, store }
    }

    /// Writes against placeholder data would create duplicates of real rows
    async fn authoritative_snapshot(&self) -> Result<CatalogSnapshot> {
        let snapshot = self.cache.get(false).await;
        if snapshot.is_degraded() {
            return Err(AppError::StoreUnavailable(
                "catalog is not backed by the locality store".to_string(),
            ));
        }
        Ok(snapshot)
    }

    pub async fn resolve_or_create(&self, candidate: &LocalityCandidate) -> Result<ResolvedLocality> {
        let name = candidate.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }

        let key = identity_key(name);
        let existing = {
            let snapshot = self.authoritative_snapshot().await?;
            let mut matches = snapshot
                .localities()
                .iter()
                .filter(|l| identity_key(&l.name) == key)
                .peekable();
            let first = matches.peek().copied();
            matches
                .find(|l| l.active)
                .or(first)
                .map(|l| ResolvedLocality {
                    id: l.id,
                    name: l.name.clone(),
                    is_new: false,
                })
        };

        if let Some(existing) = existing {
            tracing::debug!("Resolved '{}' to existing locality {}", name, existing.id);
            return Ok(existing);
        }

        let draft = draft_for(candidate, name);
        let record = self.store.create(&draft).await.map_err(|e| {
            tracing::error!("Failed to auto-register locality '{}': {:?}", name, e);
            e
        })?;

        tracing::info!(
            "Auto-registered locality '{}' ({}) from {}",
            name,
            record.id,
            candidate.provenance.kind
        );

        self.cache.refresh_after_write().await;

        Ok(ResolvedLocality {
            id: record.id,
            name: record.name.unwrap_or_else(|| name.to_string()),
            is_new: true,
        })
    }

    /// Resolves candidates in order. A failing item never stops the batch.
    pub async fn resolve_or_create_batch(
        &self,
        candidates: &[LocalityCandidate],
    ) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            let result = self.resolve_or_create(candidate).await;
            if let Err(e) = &result {
                tracing::warn!("Batch item {} ('{}') failed: {}", index, candidate.name, e);
            }
            outcomes.push(BatchOutcome {
                index,
                name: candidate.name.clone(),
                result,
            });
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        tracing::info!(
            "Resolved batch of {} candidates ({} failed)",
            outcomes.len(),
            failed
        );

        outcomes
    }

    pub async fn find_duplicates(&self) -> Vec<DuplicateGroup> {
        let snapshot = self.cache.get(false).await;
        group_duplicates(snapshot.localities())
    }

    /// Keeps the first id and deletes the rest.
    ///
    /// References held by other systems are not rewritten.
    pub async fn consolidate(&self, ids: &[Uuid]) -> Result<Consolidation> {
        let mut distinct = Vec::with_capacity(ids.len());
        let mut seen = HashSet::new();
        for id in ids {
            if seen.insert(*id) {
                distinct.push(*id);
            }
        }

        if distinct.len() < 2 {
            return Ok(Consolidation {
                canonical_id: distinct.first().copied(),
                removed_ids: Vec::new(),
            });
        }

        let snapshot = self.authoritative_snapshot().await?;
        if let Some(missing) = distinct.iter().find(|id| snapshot.find(**id).is_none()) {
            return Err(AppError::NotFound(format!(
                "Locality with id '{}' not found",
                missing
            )));
        }

        let canonical_id = distinct[0];
        let removed_ids = distinct[1..].to_vec();

        let mut deleted = Vec::with_capacity(removed_ids.len());
        for id in &removed_ids {
            if let Err(e) = self.store.delete(*id).await {
                tracing::error!(
                    "Failed to delete duplicate locality {} after removing {:?}: {:?}",
                    id,
                    deleted,
                    e
                );
                self.cache.refresh_after_write().await;
                return Err(e);
            }
            deleted.push(*id);
        }

        tracing::info!(
            "Consolidated {} duplicates into locality {}; external references were not rewritten",
            removed_ids.len(),
            canonical_id
        );

        self.cache.refresh_after_write().await;

        Ok(Consolidation {
            canonical_id: Some(canonical_id),
            removed_ids,
        })
    }
}
