//! Persistence behind the resource service.
//!
//! A store holds flat JSON documents per collection. Every document carries
//! the record envelope (`_id`, `isDeleted`, stamps) next to its fields, and
//! filters address both the same way. Stores know nothing about visibility:
//! callers add the soft-delete condition themselves, except for writes,
//! which only ever touch active records.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;

use jobboard_query::{Filter, SortKey};

use crate::document::{Record, RecordId};
use crate::mutation::{Deletion, Patch};
use crate::resource::ResourceKind;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("duplicate id {0}")]
    DuplicateId(RecordId),
}

/// A read against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl StoreQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    pub fn window(mut self, skip: u64, limit: u64) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Documents matching the query, in order.
    async fn find(&self, kind: ResourceKind, query: &StoreQuery) -> Result<Vec<Value>, StoreError>;

    async fn count(&self, kind: ResourceKind, filter: &Filter) -> Result<u64, StoreError>;

    /// A document by id, deleted or not.
    async fn get(&self, kind: ResourceKind, id: RecordId) -> Result<Option<Value>, StoreError>;

    async fn insert(&self, kind: ResourceKind, record: &Record) -> Result<Value, StoreError>;

    /// Apply a patch to an active record. `None` if there is no such record.
    async fn update(
        &self,
        kind: ResourceKind,
        id: RecordId,
        patch: &Patch,
    ) -> Result<Option<Value>, StoreError>;

    /// Mark an active record deleted. `None` if it is missing or already deleted.
    async fn soft_delete(
        &self,
        kind: ResourceKind,
        id: RecordId,
        deletion: &Deletion,
    ) -> Result<Option<Value>, StoreError>;

    /// Add `by` to a numeric field of an active record.
    async fn increment(
        &self,
        kind: ResourceKind,
        id: RecordId,
        field: &str,
        by: i64,
    ) -> Result<Option<Value>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
