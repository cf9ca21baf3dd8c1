//! Fixed-size pool of probe workers.
//!
//! Records go in through a bounded work queue and come back, probed, through a
//! bounded result queue. A full work queue blocks [`ProbeWorkerPool::submit`],
//! which is what keeps at most `concurrency` probes in flight.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::error;

use ipalloc_common::record::AddressRecord;

use super::prober::Prober;
use super::resolver::PtrResolver;

#[derive(Debug, Error)]
#[error("probe workers are gone")]
pub struct PoolClosed(pub AddressRecord);

/// The two probes every worker runs against an address.
#[derive(Clone)]
pub struct Probes {
    pub prober: Arc<dyn Prober>,
    pub resolver: Arc<dyn PtrResolver>,
}

impl Probes {
    pub fn new(prober: Arc<dyn Prober>, resolver: Arc<dyn PtrResolver>) -> Self {
        Self { prober, resolver }
    }

    /// Fills `alive` and `ptr_name` of `record`. Both probes are independent
    /// and neither can fail the record.
    pub async fn probe(&self, record: &mut AddressRecord) {
        let addr = record.ip();
        let (alive, ptr_name) =
            tokio::join!(self.prober.is_alive(addr), self.resolver.lookup_ptr(addr));
        record.alive = alive;
        record.ptr_name = ptr_name.unwrap_or_default();
    }
}

type WorkQueue = Arc<Mutex<mpsc::Receiver<AddressRecord>>>;

pub struct ProbeWorkerPool {
    work_tx: mpsc::Sender<AddressRecord>,
    workers: JoinSet<()>,
}

impl ProbeWorkerPool {
    /// Starts `concurrency` workers (at least one). The returned receiver
    /// yields every submitted record exactly once, in completion order, and
    /// closes after [`Self::shutdown`] once the last worker has exited.
    pub fn spawn(concurrency: usize, probes: Probes) -> (Self, mpsc::Receiver<AddressRecord>) {
        let concurrency: usize = concurrency.max(1);
        let (work_tx, work_rx) = mpsc::channel::<AddressRecord>(concurrency);
        let (result_tx, result_rx) = mpsc::channel::<AddressRecord>(concurrency);
        let queue: WorkQueue = Arc::new(Mutex::new(work_rx));

        let mut workers = JoinSet::new();
        for _ in 0..concurrency {
            workers.spawn(worker(queue.clone(), result_tx.clone(), probes.clone()));
        }

        (Self { work_tx, workers }, result_rx)
    }

    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Queues `record` for probing, waiting while the queue is full.
    pub async fn submit(&self, record: AddressRecord) -> Result<(), PoolClosed> {
        self.work_tx
            .send(record)
            .await
            .map_err(|mpsc::error::SendError(record)| PoolClosed(record))
    }

    /// Closes the work queue and waits for the workers to drain it.
    pub async fn shutdown(self) {
        let Self {
            work_tx,
            mut workers,
        } = self;
        drop(work_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("probe worker failed: {e}");
            }
        }
    }
}

async fn worker(queue: WorkQueue, results: mpsc::Sender<AddressRecord>, probes: Probes) {
    loop {
        // The guard is released as soon as a record is taken.
        let next: Option<AddressRecord> = queue.lock().await.recv().await;
        let Some(mut record) = next else {
            break;
        };

        probes.probe(&mut record).await;

        if results.send(record).await.is_err() {
            break;
        }
    }
}
