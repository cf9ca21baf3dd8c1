//! # Scan driver
//!
//! One scan pass walks the whole pipeline:
//!
//! 1. fetch the segments from the [`SegmentSource`],
//! 2. expand every segment into host addresses,
//! 3. push one skeleton record per address through the [`ProbeWorkerPool`],
//! 4. hand every probed record to the [`Reconciler`],
//! 5. return once as many results came back as records were submitted.
//!
//! [`ScanDriver::run`] repeats passes forever, sleeping a fixed interval after
//! each pass completes, so passes never overlap.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use ipalloc_common::config::ScanConfig;
use ipalloc_common::network::AddressError;
use ipalloc_common::network::range;
use ipalloc_common::network::segment::Segment;
use ipalloc_common::record::AddressRecord;

use crate::reconciler::{Reconciled, Reconciler};
use crate::source::{SegmentSource, SourceError};
use crate::store::InventoryStore;

pub mod pool;
pub mod prober;
pub mod resolver;

pub use pool::{ProbeWorkerPool, Probes};

/// Addresses to probe in one pass, one skeleton per distinct address.
#[derive(Debug, Default)]
pub struct WorkList {
    pub records: Vec<AddressRecord>,
    pub skipped: Vec<(String, AddressError)>,
    /// Addresses already claimed by an earlier segment.
    pub overlapping: usize,
}

/// Expands `segments` into skeleton records.
///
/// A segment whose mask or address is malformed is skipped on its own. When
/// segments overlap, the first segment listing an address keeps it.
pub fn build_work_list(segments: &[Segment]) -> WorkList {
    let mut work = WorkList::default();
    let mut seen: HashSet<u32> = HashSet::new();

    for segment in segments {
        let expanded = segment
            .cidr()
            .and_then(|cidr| range::expand_addrs(&cidr).map(|addrs| (cidr, addrs)));

        let (cidr, addrs) = match expanded {
            Ok(found) => found,
            Err(e) => {
                warn!(segment = %segment.name, "skipping segment: {e}");
                work.skipped.push((segment.name.clone(), e));
                continue;
            }
        };

        for addr in addrs {
            if seen.insert(u32::from(addr)) {
                work.records.push(AddressRecord::skeleton(addr, &segment.name, &cidr));
            } else {
                work.overlapping += 1;
            }
        }
    }

    work
}

/// Counters of one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub segments: usize,
    pub skipped_segments: usize,
    pub submitted: usize,
    pub received: usize,
    pub alive: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum ScanOutcome {
    Completed(ScanReport),
    /// The segment list could not be fetched; nothing was probed.
    Abandoned(SourceError),
}

impl ScanOutcome {
    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            ScanOutcome::Completed(report) => Some(report),
            ScanOutcome::Abandoned(_) => None,
        }
    }
}

pub struct ScanDriver {
    source: Arc<dyn SegmentSource>,
    reconciler: Reconciler,
    probes: Probes,
    concurrency: usize,
    interval: Duration,
}

impl ScanDriver {
    pub fn new(
        source: Arc<dyn SegmentSource>,
        store: Arc<dyn InventoryStore>,
        probes: Probes,
        cfg: &ScanConfig,
    ) -> Self {
        Self {
            source,
            reconciler: Reconciler::new(store),
            probes,
            concurrency: cfg.concurrency,
            interval: cfg.interval,
        }
    }

    /// Runs a first pass immediately, then one pass per interval measured
    /// from the end of the previous pass, until `shutdown` fires.
    ///
    /// A pass in progress is always finished; `shutdown` is only honoured
    /// while idle.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            self.run_pass().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("scan scheduler stopped");
    }

    pub async fn run_pass(&self) -> ScanOutcome {
        self.scan().instrument(info_span!("scan_pass")).await
    }

    async fn scan(&self) -> ScanOutcome {
        let start: Instant = Instant::now();

        let segments: Vec<Segment> = match self.source.list_segments().await {
            Ok(segments) => segments,
            Err(e) => {
                error!("abandoning scan pass: {e}");
                return ScanOutcome::Abandoned(e);
            }
        };

        let work: WorkList = build_work_list(&segments);
        if work.overlapping > 0 {
            warn!(count = work.overlapping, "addresses listed by more than one segment");
        }

        let mut report = ScanReport {
            segments: segments.len(),
            skipped_segments: work.skipped.len(),
            submitted: work.records.len(),
            ..Default::default()
        };

        info!(
            "Scanning {} IP addresses {} at a time ...",
            report.submitted, self.concurrency
        );

        let (pool, mut results) = ProbeWorkerPool::spawn(self.concurrency, self.probes.clone());
        let records: Vec<AddressRecord> = work.records;
        let feeder = tokio::spawn(async move {
            for record in records {
                if let Err(e) = pool.submit(record).await {
                    error!(address = %e.0.address, "{e}");
                    break;
                }
            }
            pool.shutdown().await;
        });

        while report.received < report.submitted {
            let Some(result) = results.recv().await else {
                break;
            };
            report.received += 1;
            if result.alive {
                report.alive += 1;
            }

            match self.reconciler.apply(&result).await {
                Ok(Reconciled::Inserted) => report.inserted += 1,
                Ok(Reconciled::Updated) => report.updated += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(address = %result.address, "failed to store scan result: {e}");
                }
            }
        }

        if let Err(e) = feeder.await {
            error!("probe feeder failed: {e}");
        }
        if report.received < report.submitted {
            warn!(
                missing = report.submitted - report.received,
                "scan pass ended with unprobed addresses"
            );
        }

        report.elapsed = start.elapsed();
        info!(
            alive = report.alive,
            inserted = report.inserted,
            updated = report.updated,
            failed = report.failed,
            "Finished scan of {} IP addresses in {:.2?}",
            report.received,
            report.elapsed
        );

        ScanOutcome::Completed(report)
    }
}
