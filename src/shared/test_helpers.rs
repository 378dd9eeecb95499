#![cfg(test)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::localities::models::{
    AdministrativeType, Locality, LocalityDraft, LocalityFilter, LocalityRecord,
};
use crate::features::localities::services::matcher;
use crate::features::localities::stores::LocalityStore;

/// Builds a store row with the given name, type and parents
pub fn record(
    name: &str,
    kind: AdministrativeType,
    department: Option<&str>,
    province: Option<&str>,
    district: Option<&str>,
) -> LocalityRecord {
    LocalityRecord {
        id: Uuid::new_v4(),
        name: Some(name.to_string()),
        administrative_type: Some(kind),
        territorial_level: Some(kind.into()),
        department: department.map(str::to_string),
        province: province.map(str::to_string),
        district: district.map(str::to_string),
        is_active: Some(true),
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
        ..Default::default()
    }
}

/// Same as [`record`], already normalized
pub fn locality(
    name: &str,
    kind: AdministrativeType,
    department: Option<&str>,
    province: Option<&str>,
    district: Option<&str>,
) -> Locality {
    record(name, kind, department, province, district)
        .into_locality()
        .expect("test locality must have a name")
}

fn draft_to_record(id: Uuid, draft: &LocalityDraft) -> LocalityRecord {
    LocalityRecord {
        id,
        name: Some(draft.name.clone()),
        administrative_type: Some(draft.administrative_type),
        territorial_level: Some(draft.territorial_level),
        department: draft.department.clone(),
        province: draft.province.clone(),
        district: draft.district.clone(),
        official_code: draft.official_code.clone(),
        lat: draft.coordinates.map(|c| c.latitude),
        lng: draft.coordinates.map(|c| c.longitude),
        description: draft.description.clone(),
        observations: draft.observations.clone(),
        is_active: Some(draft.active),
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
    }
}

/// In-memory [`LocalityStore`] with call counters and failure injection
#[derive(Default)]
pub struct InMemoryLocalityStore {
    records: Mutex<Vec<LocalityRecord>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    failing: AtomicBool,
    undeletable: Mutex<HashSet<Uuid>>,
    /// When set, `list_all` reads its rows and then waits for a notification
    /// before answering
    gate: Option<Arc<Notify>>,
}

impl InMemoryLocalityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<LocalityRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn gated(records: Vec<LocalityRecord>, gate: Arc<Notify>) -> Self {
        Self {
            records: Mutex::new(records),
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes `delete` fail for this id
    pub fn fail_delete_of(&self, id: Uuid) {
        self.undeletable.lock().unwrap().insert(id);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn push(&self, record: LocalityRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<LocalityRecord> {
        self.records.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AppError::StoreUnavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalityStore for InMemoryLocalityStore {
    async fn list_all(&self) -> Result<Vec<LocalityRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.check_available()?;
        Ok(records)
    }

    async fn list_by_filter(&self, filter: &LocalityFilter) -> Result<Vec<LocalityRecord>> {
        self.check_available()?;
        Ok(self
            .records()
            .into_iter()
            .filter(|r| {
                r.clone()
                    .into_locality()
                    .is_some_and(|l| matcher::matches_filter(&l, filter))
            })
            .collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<LocalityRecord>> {
        self.check_available()?;
        Ok(self.records().into_iter().find(|r| r.id == id))
    }

    async fn create(&self, draft: &LocalityDraft) -> Result<LocalityRecord> {
        self.check_available()?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let record = draft_to_record(Uuid::new_v4(), draft);
        self.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, draft: &LocalityDraft) -> Result<LocalityRecord> {
        self.check_available()?;
        let mut records = self.records.lock().unwrap();
        let slot = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Locality with id '{}' not found", id)))?;
        let created_at = slot.created_at;
        *slot = draft_to_record(id, draft);
        slot.created_at = created_at;
        Ok(slot.clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<LocalityRecord> {
        self.check_available()?;
        let mut records = self.records.lock().unwrap();
        let slot = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Locality with id '{}' not found", id)))?;
        slot.is_active = Some(active);
        slot.updated_at = Some(Utc::now());
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.check_available()?;
        if self.undeletable.lock().unwrap().contains(&id) {
            return Err(AppError::StoreUnavailable("delete rejected".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(AppError::NotFound(format!(
                "Locality with id '{}' not found",
                id
            )));
        }
        Ok(())
    }
}
