use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ipalloc_common::network::segment::Segment;
use ipalloc_common::record::{AddressRecord, RecordFilter};
use ipalloc_core::allocation::{AllocationService, Allocator};
use ipalloc_core::scanner::ScanOutcome;
use ipalloc_core::source::StaticSource;
use ipalloc_core::store::InventoryStore;
use ipalloc_core::store::memory::MemoryStore;

use crate::fakes::{
    CountingStore, FlakySource, ScriptedProber, ScriptedResolver, driver, driver_every, id, ip,
};

fn lab_segments() -> Vec<Segment> {
    vec![
        Segment::new("seg1", "10.0.0.0", "255.255.255.248"),
        Segment::new("seg2", "10.0.1.0", "255.255.255.252"),
    ]
}

async fn stored(store: &dyn InventoryStore, addr: &str) -> AddressRecord {
    store
        .find_by_id(id(addr))
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("{addr} not stored"))
}

#[tokio::test]
async fn full_pass_stores_every_expandable_address() {
    let mut segments = lab_segments();
    segments.push(Segment::new("broken", "10.0.2.0", "255.0.255.0"));
    let store = Arc::new(MemoryStore::new());
    let prober = Arc::new(ScriptedProber::alive(&["10.0.0.2", "10.0.1.1"]));
    let scan = driver(
        Arc::new(StaticSource::new(segments)),
        store.clone(),
        prober.clone(),
        ScriptedResolver::names(&[("10.0.0.2", "gw.lab"), ("10.0.0.5", "printer.lab")]),
    );

    let outcome = scan.run_pass().await;

    let report = outcome.report().expect("pass completes");
    assert_eq!(report.segments, 3);
    assert_eq!(report.skipped_segments, 1);
    assert_eq!(report.submitted, 8);
    assert_eq!(report.received, 8);
    assert_eq!(report.inserted, 8);
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(report.alive, 2);
    assert_eq!(prober.probes(), 8);

    let seg1 = store.find_all(&RecordFilter::by_segment("seg1")).await.unwrap();
    let addrs: Vec<&str> = seg1.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(
        addrs,
        ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5", "10.0.0.6"]
    );
    assert!(seg1.iter().all(|r| r.cidr == "10.0.0.0/29" && !r.reserved && !r.locked));
    assert!(seg1.iter().all(|r| r.network == "10.0.0.0"));
    assert_eq!(store.find_all(&RecordFilter::by_segment("seg2")).await.unwrap().len(), 2);

    let gateway = stored(store.as_ref(), "10.0.0.2").await;
    assert!(gateway.alive);
    assert_eq!(gateway.ptr_name, "gw.lab");

    let printer = stored(store.as_ref(), "10.0.0.5").await;
    assert!(!printer.alive);
    assert_eq!(printer.ptr_name, "printer.lab");

    assert!(stored(store.as_ref(), "10.0.0.3").await.ptr_name.is_empty());
}

#[tokio::test]
async fn second_pass_refreshes_liveness_and_keeps_allocation_state() {
    let mut locked = AddressRecord::skeleton(ip("10.0.0.6"), "seg1", "10.0.0.0/29");
    locked.locked = true;
    let store = Arc::new(MemoryStore::with_records([locked]));
    let prober = Arc::new(ScriptedProber::alive(&["10.0.0.2"]));
    let scan = driver(
        Arc::new(StaticSource::new(lab_segments())),
        store.clone(),
        prober.clone(),
        ScriptedResolver::names(&[("10.0.0.2", "gw.lab")]),
    );

    let first = scan.run_pass().await;
    assert_eq!(first.report().map(|r| (r.inserted, r.updated)), Some((7, 1)));

    let allocator = AllocationService::new(store.clone());
    assert_eq!(allocator.reserve("seg1").await.unwrap(), "10.0.0.1");

    // The reserved host comes up, the gateway goes down.
    prober.set_alive(&["10.0.0.1"]);
    let second = scan.run_pass().await;
    assert_eq!(second.report().map(|r| (r.inserted, r.updated)), Some((0, 8)));
    assert_eq!(store.len().await, 8);

    let reserved = stored(store.as_ref(), "10.0.0.1").await;
    assert!(reserved.alive);
    assert!(reserved.reserved);

    let gateway = stored(store.as_ref(), "10.0.0.2").await;
    assert!(!gateway.alive);
    assert!(!gateway.reserved);
    assert_eq!(gateway.ptr_name, "gw.lab");

    let still_locked = stored(store.as_ref(), "10.0.0.6").await;
    assert!(still_locked.locked);
    assert!(!still_locked.reserved);
}

#[tokio::test]
async fn unavailable_source_abandons_only_that_pass() {
    let source = Arc::new(FlakySource::new(lab_segments(), 1));
    let store = Arc::new(MemoryStore::new());
    let prober = Arc::new(ScriptedProber::default());
    let scan = driver(source.clone(), store.clone(), prober.clone(), ScriptedResolver::default());

    assert!(matches!(scan.run_pass().await, ScanOutcome::Abandoned(_)));
    assert_eq!(prober.probes(), 0);
    assert!(store.is_empty().await);

    let retry = scan.run_pass().await;
    assert_eq!(retry.report().map(|r| r.inserted), Some(8));
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn failed_record_writes_do_not_stop_the_pass() {
    let store = Arc::new(CountingStore::refusing_inserts([id("10.0.0.3")]));
    let scan = driver(
        Arc::new(StaticSource::new(lab_segments())),
        store.clone(),
        Arc::new(ScriptedProber::default()),
        ScriptedResolver::default(),
    );

    let outcome = scan.run_pass().await;

    let report = outcome.report().expect("pass completes");
    assert_eq!(report.received, 8);
    assert_eq!(report.failed, 1);
    assert_eq!(report.inserted, 7);
    assert_eq!(store.inner.len().await, 7);
    assert!(store.inner.find_by_id(id("10.0.0.3")).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_segment_list_completes_immediately() {
    let store = Arc::new(MemoryStore::new());
    let scan = driver(
        Arc::new(StaticSource::new(Vec::new())),
        store.clone(),
        Arc::new(ScriptedProber::default()),
        ScriptedResolver::default(),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), scan.run_pass())
        .await
        .expect("pass with no work finishes");

    assert_eq!(outcome.report().map(|r| r.submitted), Some(0));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn scheduler_repeats_passes_until_cancelled() {
    let source = Arc::new(FlakySource::new(lab_segments(), 1));
    let store = Arc::new(MemoryStore::new());
    let scan = driver(
        source.clone(),
        store.clone(),
        Arc::new(ScriptedProber::default()),
        ScriptedResolver::default(),
    );

    let shutdown = CancellationToken::new();
    let scheduler = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { scan.run(shutdown).await }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while source.calls() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("scheduler keeps scanning after a failed pass");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), scheduler)
        .await
        .expect("scheduler stops once cancelled")
        .unwrap();

    assert_eq!(store.len().await, 8);
}

#[tokio::test(start_paused = true)]
async fn next_pass_waits_a_full_interval_after_the_previous_one_ends() {
    let interval = Duration::from_secs(60);
    let pass_length = Duration::from_secs(90);
    let source = Arc::new(FlakySource::new(lab_segments(), 0));
    let prober = Arc::new(ScriptedProber::slow(pass_length));
    let scan = driver_every(
        interval,
        source.clone(),
        Arc::new(MemoryStore::new()),
        prober.clone(),
        ScriptedResolver::default(),
    );

    let shutdown = CancellationToken::new();
    let scheduler = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { scan.run(shutdown).await }
    });

    while source.calls() < 3 {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    shutdown.cancel();
    scheduler.await.unwrap();

    let called_at = source.called_at();
    let finished_at = prober.finished_at();
    for pair in called_at.windows(2) {
        let (start, next) = (pair[0], pair[1]);
        let pass_end = finished_at
            .iter()
            .copied()
            .filter(|t| *t >= start && *t < next)
            .max()
            .expect("every pass checks its addresses before the next starts");

        assert!(next - pass_end >= interval, "next pass began {:?} after the last", next - pass_end);
        assert!(next - start >= pass_length + interval);
    }
}
