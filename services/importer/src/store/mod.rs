//! Persistent Store seam
//!
//! The pipeline only needs equality lookups, keyed upserts, a grouped scan
//! for duplicates and an all-or-nothing batch delete. `PgStore` backs
//! production runs; `MemoryStore` backs dry runs and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::StoreError;
use crate::model::{CutoffRecord, EntityId, EntityKind, NaturalKey};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// An existing record with the same natural key was overwritten
    Replaced,
}

/// Records sharing one natural key, insertion sequence ascending
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub key: NaturalKey,
    pub seqs: Vec<i64>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Exact match on the normalized name
    async fn find_entity(&self, kind: EntityKind, name: &str)
        -> Result<Option<EntityId>, StoreError>;

    /// Insert a new entity with placeholder attributes. If the name already
    /// exists (another process won a race) its id is returned instead.
    async fn insert_entity(&self, kind: EntityKind, name: &str) -> Result<EntityId, StoreError>;

    /// Write-or-replace under the record's natural key
    async fn upsert_cutoff(&self, record: &CutoffRecord) -> Result<UpsertOutcome, StoreError>;

    /// Every natural key held by more than one record
    async fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>, StoreError>;

    /// Delete exactly these records in one transaction, or none of them
    async fn delete_cutoffs(&self, seqs: &[i64]) -> Result<u64, StoreError>;

    async fn cutoff_count(&self) -> Result<u64, StoreError>;

    async fn entity_count(&self, kind: EntityKind) -> Result<u64, StoreError>;
}
