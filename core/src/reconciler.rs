//! Applies probe results to the persisted inventory.

use std::sync::Arc;

use ipalloc_common::record::{AddressRecord, FieldUpdate};

use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// First sighting, the whole record was written.
    Inserted,
    /// Known address, only `alive` and `ptr_name` were refreshed.
    Updated,
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn InventoryStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Inserts `result` if its id is unknown, otherwise refreshes the
    /// observation fields. Allocation flags and segment placement of an
    /// existing record are never written.
    pub async fn apply(&self, result: &AddressRecord) -> Result<Reconciled, StoreError> {
        match self.store.find_by_id(result.id).await? {
            None => {
                let fresh = AddressRecord {
                    reserved: false,
                    locked: false,
                    ..result.clone()
                };
                self.store.insert(&fresh).await?;
                Ok(Reconciled::Inserted)
            }
            Some(_) => {
                let observation = FieldUpdate::observation(result.alive, result.ptr_name.clone());
                self.store.update_fields(result.id, &observation).await?;
                Ok(Reconciled::Updated)
            }
        }
    }
}
