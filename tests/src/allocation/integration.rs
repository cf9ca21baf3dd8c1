use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;

use ipalloc_common::network::segment::Segment;
use ipalloc_common::record::{AddressRecord, RecordFilter};
use ipalloc_core::allocation::{AllocationError, AllocationService, Allocator, LoggingAllocator};
use ipalloc_core::source::StaticSource;
use ipalloc_core::store::InventoryStore;
use ipalloc_core::store::memory::MemoryStore;

use crate::fakes::{CountingStore, ScriptedProber, ScriptedResolver, driver, ip};

/// A scanned `/30`: `10.0.0.1` answers ping, `10.0.0.2` is free.
async fn scanned_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let scan = driver(
        Arc::new(StaticSource::new(vec![Segment::new(
            "seg1",
            "10.0.0.0",
            "255.255.255.252",
        )])),
        store.clone(),
        Arc::new(ScriptedProber::alive(&["10.0.0.1"])),
        ScriptedResolver::default(),
    );
    assert!(scan.run_pass().await.report().is_some());
    store
}

#[tokio::test]
async fn concurrent_reserves_on_single_free_address() {
    let store = scanned_store().await;
    let service = Arc::new(LoggingAllocator::new(AllocationService::new(store.clone())));

    let mut calls = JoinSet::new();
    for _ in 0..32 {
        let service = service.clone();
        calls.spawn(async move { service.reserve("seg1").await });
    }

    let mut granted = Vec::new();
    let mut refused = 0;
    while let Some(joined) = calls.join_next().await {
        match joined.unwrap() {
            Ok(addr) => granted.push(addr),
            Err(AllocationError::NoAvailableAddress(seg)) => {
                assert_eq!(seg, "seg1");
                refused += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(granted, ["10.0.0.2"]);
    assert_eq!(refused, 31);

    let reserved = store
        .find_all(&RecordFilter {
            reserved: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(reserved.len(), 1);
    assert!(!reserved[0].alive);
}

#[tokio::test]
async fn release_then_reserve_hands_the_address_out_again() {
    let store = scanned_store().await;
    let service = AllocationService::new(store);

    assert_eq!(service.reserve("seg1").await.unwrap(), "10.0.0.2");
    assert!(service.reserve("seg1").await.is_err());

    assert_eq!(service.release("10.0.0.2").await.unwrap(), "10.0.0.2 released");
    assert_eq!(service.reserve("seg1").await.unwrap(), "10.0.0.2");
}

#[tokio::test]
async fn release_of_unknown_address_reports_success_without_mutation() {
    let existing = AddressRecord::skeleton(ip("10.0.0.9"), "seg1", "10.0.0.0/24");
    let store = Arc::new(CountingStore::with_records([existing.clone()]));
    let service = AllocationService::new(store.clone());

    let msg = service.release("10.0.0.5").await.unwrap();

    assert_eq!(msg, "10.0.0.5 released");
    assert_eq!(store.calls(), 1);
    assert_eq!(store.inner.len().await, 1);
    assert_eq!(
        store.inner.find_by_id(existing.id).await.unwrap(),
        Some(existing)
    );
}

#[tokio::test]
async fn malformed_release_performs_no_store_access() {
    let store = Arc::new(CountingStore::default());
    let service = AllocationService::new(store.clone());

    let err = service.release("not-an-ip").await.unwrap_err();

    assert!(matches!(err, AllocationError::InvalidAddress(input) if input == "not-an-ip"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn reservations_survive_a_concurrent_scan_pass() {
    let store = Arc::new(MemoryStore::with_records((1..=6).map(|last| {
        AddressRecord::skeleton(
            std::net::Ipv4Addr::new(10, 0, 0, last),
            "seg1",
            "10.0.0.0/29",
        )
    })));
    let scan = driver(
        Arc::new(StaticSource::new(vec![Segment::new(
            "seg1",
            "10.0.0.0",
            "255.255.255.248",
        )])),
        store.clone(),
        Arc::new(ScriptedProber::default()),
        ScriptedResolver::default(),
    );
    let service = AllocationService::new(store.clone());

    let (outcome, granted) = tokio::join!(scan.run_pass(), async {
        let mut granted = HashSet::new();
        for _ in 0..4 {
            granted.insert(service.reserve("seg1").await.unwrap());
        }
        granted
    });

    assert_eq!(outcome.report().map(|r| r.updated), Some(6));
    let reserved: HashSet<String> = store
        .find_all(&RecordFilter {
            reserved: Some(true),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.address)
        .collect();
    assert_eq!(reserved, granted);
    assert_eq!(reserved.len(), 4);
}
