//! # Allocation
//!
//! Reserve and release addresses of the persisted inventory. Both operations
//! run independently of, and concurrently with, scan passes: a scan never
//! writes `reserved`, and allocation never writes `alive` or `ptr_name`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use ipalloc_common::network::range;
use ipalloc_common::record::{FieldUpdate, RecordFilter};

use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("no available address in segment {0}")]
    NoAvailableAddress(String),
    #[error("invalid ip: {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait Allocator: Send + Sync {
    /// Marks one free address of `segment_name` as reserved and returns it.
    async fn reserve(&self, segment_name: &str) -> Result<String, AllocationError>;

    /// Clears the reservation of `address`, returning a confirmation message.
    async fn release(&self, address: &str) -> Result<String, AllocationError>;
}

#[derive(Clone)]
pub struct AllocationService {
    store: Arc<dyn InventoryStore>,
}

impl AllocationService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Allocator for AllocationService {
    async fn reserve(&self, segment_name: &str) -> Result<String, AllocationError> {
        // Selection and update are one store operation; see
        // `InventoryStore::update_fields_if_matches`.
        let reserved = self
            .store
            .update_fields_if_matches(
                &RecordFilter::available_in(segment_name),
                &FieldUpdate::reserved(true),
            )
            .await?;

        reserved
            .map(|record| record.address)
            .ok_or_else(|| AllocationError::NoAvailableAddress(segment_name.to_string()))
    }

    async fn release(&self, address: &str) -> Result<String, AllocationError> {
        let id: u32 =
            range::to_id(address).map_err(|_| AllocationError::InvalidAddress(address.to_string()))?;

        // Releasing an unknown or already free address is not an error.
        let matched: u64 = self.store.update_fields(id, &FieldUpdate::reserved(false)).await?;
        debug!(address, matched, "release applied");

        Ok(format!("{address} released"))
    }
}

/// Logs method, input, output, error and duration of every call to `A`.
pub struct LoggingAllocator<A> {
    next: A,
}

impl<A: Allocator> LoggingAllocator<A> {
    pub fn new(next: A) -> Self {
        Self { next }
    }
}

fn log_call(method: &str, input: &str, result: &Result<String, AllocationError>, took: Duration) {
    match result {
        Ok(output) => info!(method, input, output = %output, took = ?took, "allocation call"),
        Err(e) => info!(method, input, output = "", err = %e, took = ?took, "allocation call"),
    }
}

#[async_trait]
impl<A: Allocator> Allocator for LoggingAllocator<A> {
    async fn reserve(&self, segment_name: &str) -> Result<String, AllocationError> {
        let begin = Instant::now();
        let result = self.next.reserve(segment_name).await;
        log_call("reserve", segment_name, &result, begin.elapsed());
        result
    }

    async fn release(&self, address: &str) -> Result<String, AllocationError> {
        let begin = Instant::now();
        let result = self.next.release(address).await;
        log_call("release", address, &result, begin.elapsed());
        result
    }
}
