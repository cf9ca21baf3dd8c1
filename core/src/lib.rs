//! Scan pipeline and allocation service of the IPv4 inventory.
//!
//! A [`scanner::ScanDriver`] fetches segments from a [`source::SegmentSource`],
//! probes every host address through a [`scanner::ProbeWorkerPool`] and folds
//! the results into an [`store::InventoryStore`] via the
//! [`reconciler::Reconciler`]. The [`allocation::AllocationService`] reserves
//! and releases addresses of the same store.

pub mod allocation;
pub mod reconciler;
pub mod scanner;
pub mod source;
pub mod store;
