//! # Inventory store port
//!
//! The persisted inventory is reached only through [`InventoryStore`]. Every
//! method is a single document operation; in particular
//! [`InventoryStore::update_fields_if_matches`] must select and mutate in one
//! indivisible step, which is what keeps concurrent reservations apart.
//!
//! Adapters:
//! * [`memory::MemoryStore`]: in-process map, used by tests and embedders.
//! * [`postgres::PgStore`]: PostgreSQL table, used by the service.

use async_trait::async_trait;
use thiserror::Error;

use ipalloc_common::record::{AddressRecord, FieldUpdate, RecordFilter};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} already exists")]
    Duplicate(u32),
    #[error("invalid collection name {0:?}")]
    InvalidCollection(String),
    #[error("stored record {id} is corrupt: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("store backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn find_by_id(&self, id: u32) -> Result<Option<AddressRecord>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when a record with the same id exists.
    async fn insert(&self, record: &AddressRecord) -> Result<(), StoreError>;

    /// Blind update of the record with `id`. Returns the number of records
    /// matched, zero when the id is unknown.
    async fn update_fields(&self, id: u32, update: &FieldUpdate) -> Result<u64, StoreError>;

    /// First matching record in natural (ascending id) order.
    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<AddressRecord>, StoreError>;

    /// All matching records in natural order.
    async fn find_all(&self, filter: &RecordFilter) -> Result<Vec<AddressRecord>, StoreError>;

    /// Atomically picks the first record matching `filter`, applies `update`
    /// and returns the updated record. No other writer can observe or change
    /// the record between the match and the write.
    async fn update_fields_if_matches(
        &self,
        filter: &RecordFilter,
        update: &FieldUpdate,
    ) -> Result<Option<AddressRecord>, StoreError>;
}
