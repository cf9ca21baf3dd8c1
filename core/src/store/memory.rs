use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use ipalloc_common::record::{AddressRecord, FieldUpdate, RecordFilter};

use super::{InventoryStore, StoreError};

/// Inventory kept in process memory, ordered by id.
///
/// Conditional updates run under one write guard, so they are atomic with
/// respect to every other operation on the same store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<u32, AddressRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = AddressRecord>) -> Self {
        let records = records.into_iter().map(|rec| (rec.id, rec)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn find_by_id(&self, id: u32) -> Result<Option<AddressRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn insert(&self, record: &AddressRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_fields(&self, id: u32, update: &FieldUpdate) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => {
                update.apply_to(record);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<AddressRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.values().find(|rec| filter.matches(rec)).cloned())
    }

    async fn find_all(&self, filter: &RecordFilter) -> Result<Vec<AddressRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|rec| filter.matches(rec))
            .cloned()
            .collect())
    }

    async fn update_fields_if_matches(
        &self,
        filter: &RecordFilter,
        update: &FieldUpdate,
    ) -> Result<Option<AddressRecord>, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.values_mut().find(|rec| filter.matches(rec)) else {
            return Ok(None);
        };
        update.apply_to(record);
        Ok(Some(record.clone()))
    }
}
