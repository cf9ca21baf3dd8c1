pub mod allocate;
pub mod inventory;
pub mod scan;
pub mod serve;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use ipalloc_common::config::{Config, ScanConfig};
use ipalloc_core::scanner::prober::PingProber;
use ipalloc_core::scanner::resolver::DnsPtrResolver;
use ipalloc_core::scanner::{Probes, ScanDriver};
use ipalloc_core::source::XcatSource;
use ipalloc_core::store::postgres::PgStore;

#[derive(Parser)]
#[command(name = "ipalloc")]
#[command(about = "IPv4 inventory scanner and address allocator.")]
pub struct CommandLine {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan periodically and serve the allocation API
    Serve,
    /// Run a single scan pass and exit
    #[command(alias = "s")]
    Scan,
    /// Reserve a free address in a segment
    Reserve { segment: String },
    /// Release a reserved address
    Release { address: String },
    /// List the stored inventory
    #[command(alias = "i")]
    Inventory {
        /// Only list records of this segment
        #[arg(long)]
        segment: Option<String>,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Pool size that leaves room for the probe workers and the API at once.
fn store_connections(scan: &ScanConfig) -> u32 {
    u32::try_from(scan.concurrency.clamp(4, 32)).unwrap_or(32)
}

pub(crate) async fn connect_store(cfg: &Config) -> anyhow::Result<Arc<PgStore>> {
    let store = PgStore::connect(&cfg.store, store_connections(&cfg.scan))
        .await
        .with_context(|| format!("connecting to store at {}:{}", cfg.store.host, cfg.store.port))?;
    store
        .ensure_schema()
        .await
        .context("preparing inventory table")?;
    info!(
        database = %cfg.store.database,
        table = %cfg.store.collection,
        "Connected to inventory store"
    );
    Ok(Arc::new(store))
}

pub(crate) fn build_driver(cfg: &Config, store: Arc<PgStore>) -> anyhow::Result<ScanDriver> {
    let source = XcatSource::new(&cfg.source).context("building segment source client")?;

    let resolver = match cfg.scan.dns_server {
        Some(server) => DnsPtrResolver::new(server, cfg.scan.ptr_timeout),
        None => DnsPtrResolver::from_system(cfg.scan.ptr_timeout),
    };
    let probes = Probes::new(
        Arc::new(PingProber::new(cfg.scan.ping_timeout)),
        Arc::new(resolver),
    );

    Ok(ScanDriver::new(Arc::new(source), store, probes, &cfg.scan))
}
