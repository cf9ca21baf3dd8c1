use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use ipalloc_common::config::ScanConfig;
use ipalloc_common::network::segment::Segment;
use ipalloc_common::record::{AddressRecord, FieldUpdate, RecordFilter};
use ipalloc_core::scanner::prober::Prober;
use ipalloc_core::scanner::resolver::PtrResolver;
use ipalloc_core::scanner::{Probes, ScanDriver};
use ipalloc_core::source::{SegmentSource, SourceError};
use ipalloc_core::store::memory::MemoryStore;
use ipalloc_core::store::{InventoryStore, StoreError};

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

pub fn id(s: &str) -> u32 {
    u32::from(ip(s))
}

/// Answers from a mutable set of live addresses.
#[derive(Default)]
pub struct ScriptedProber {
    alive: Mutex<HashSet<Ipv4Addr>>,
    delay: Duration,
    finished_at: Mutex<Vec<Instant>>,
    pub probes: AtomicUsize,
}

impl ScriptedProber {
    pub fn alive(addrs: &[&str]) -> Self {
        let prober = Self::default();
        prober.set_alive(addrs);
        prober
    }

    /// Takes `delay` to answer every address.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn finished_at(&self) -> Vec<Instant> {
        self.finished_at.lock().unwrap().clone()
    }

    pub fn set_alive(&self, addrs: &[&str]) {
        *self.alive.lock().unwrap() = addrs.iter().map(|a| ip(a)).collect();
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn is_alive(&self, addr: Ipv4Addr) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.finished_at.lock().unwrap().push(Instant::now());
        self.alive.lock().unwrap().contains(&addr)
    }
}

#[derive(Default)]
pub struct ScriptedResolver {
    names: HashMap<Ipv4Addr, String>,
}

impl ScriptedResolver {
    pub fn names(pairs: &[(&str, &str)]) -> Self {
        Self {
            names: pairs
                .iter()
                .map(|(addr, name)| (ip(addr), name.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl PtrResolver for ScriptedResolver {
    async fn lookup_ptr(&self, addr: Ipv4Addr) -> Option<String> {
        self.names.get(&addr).cloned()
    }
}

/// Fails the first `failures` calls, then lists `segments`.
pub struct FlakySource {
    segments: Vec<Segment>,
    failures: usize,
    called_at: Mutex<Vec<Instant>>,
    pub calls: AtomicUsize,
}

impl FlakySource {
    pub fn new(segments: Vec<Segment>, failures: usize) -> Self {
        Self {
            segments,
            failures,
            called_at: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn called_at(&self) -> Vec<Instant> {
        self.called_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentSource for FlakySource {
    async fn list_segments(&self) -> Result<Vec<Segment>, SourceError> {
        self.called_at.lock().unwrap().push(Instant::now());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(SourceError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        Ok(self.segments.clone())
    }
}

/// Memory store that counts every call and can refuse inserts of chosen ids.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    calls: AtomicUsize,
    refuse_inserts: HashSet<u32>,
}

impl CountingStore {
    pub fn with_records(records: impl IntoIterator<Item = AddressRecord>) -> Self {
        Self {
            inner: MemoryStore::with_records(records),
            ..Default::default()
        }
    }

    pub fn refusing_inserts(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            refuse_inserts: ids.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InventoryStore for CountingStore {
    async fn find_by_id(&self, id: u32) -> Result<Option<AddressRecord>, StoreError> {
        self.count();
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, record: &AddressRecord) -> Result<(), StoreError> {
        self.count();
        if self.refuse_inserts.contains(&record.id) {
            return Err(StoreError::Corrupt {
                id: i64::from(record.id),
                reason: "refused by test".into(),
            });
        }
        self.inner.insert(record).await
    }

    async fn update_fields(&self, id: u32, update: &FieldUpdate) -> Result<u64, StoreError> {
        self.count();
        self.inner.update_fields(id, update).await
    }

    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<AddressRecord>, StoreError> {
        self.count();
        self.inner.find_one(filter).await
    }

    async fn find_all(&self, filter: &RecordFilter) -> Result<Vec<AddressRecord>, StoreError> {
        self.count();
        self.inner.find_all(filter).await
    }

    async fn update_fields_if_matches(
        &self,
        filter: &RecordFilter,
        update: &FieldUpdate,
    ) -> Result<Option<AddressRecord>, StoreError> {
        self.count();
        self.inner.update_fields_if_matches(filter, update).await
    }
}

pub fn scan_config(concurrency: usize, interval: Duration) -> ScanConfig {
    ScanConfig {
        concurrency,
        interval,
        ..Default::default()
    }
}

pub fn driver(
    source: Arc<dyn SegmentSource>,
    store: Arc<dyn InventoryStore>,
    prober: Arc<ScriptedProber>,
    resolver: ScriptedResolver,
) -> ScanDriver {
    driver_every(Duration::from_millis(20), source, store, prober, resolver)
}

pub fn driver_every(
    interval: Duration,
    source: Arc<dyn SegmentSource>,
    store: Arc<dyn InventoryStore>,
    prober: Arc<ScriptedProber>,
    resolver: ScriptedResolver,
) -> ScanDriver {
    ScanDriver::new(
        source,
        store,
        Probes::new(prober, Arc::new(resolver)),
        &scan_config(8, interval),
    )
}
