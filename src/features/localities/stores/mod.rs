//! Adapters for the external locality store.
//!
//! The engine never owns persistence. It reads and writes through
//! [`LocalityStore`], implemented here for PostgreSQL and for an upstream
//! REST API.

mod http;
mod postgres;

pub use http::HttpLocalityStore;
pub use postgres::PgLocalityStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::localities::models::{LocalityDraft, LocalityFilter, LocalityRecord};

/// Query/command interface of the locality store
#[async_trait]
pub trait LocalityStore: Send + Sync {
    /// Full catalog, inactive rows included
    async fn list_all(&self) -> Result<Vec<LocalityRecord>>;

    /// Server-side structured filtering
    async fn list_by_filter(&self, filter: &LocalityFilter) -> Result<Vec<LocalityRecord>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<LocalityRecord>>;

    async fn create(&self, draft: &LocalityDraft) -> Result<LocalityRecord>;

    async fn update(&self, id: Uuid, draft: &LocalityDraft) -> Result<LocalityRecord>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<LocalityRecord>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}
