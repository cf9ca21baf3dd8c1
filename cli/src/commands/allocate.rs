use ipalloc_common::config::Config;
use ipalloc_core::allocation::{AllocationService, Allocator, LoggingAllocator};

use crate::commands::connect_store;
use crate::terminal::print;

async fn allocator(cfg: &Config) -> anyhow::Result<LoggingAllocator<AllocationService>> {
    let store = connect_store(cfg).await?;
    Ok(LoggingAllocator::new(AllocationService::new(store)))
}

pub async fn reserve(cfg: &Config, segment: &str) -> anyhow::Result<()> {
    let address: String = allocator(cfg).await?.reserve(segment).await?;
    print::print(&address);
    Ok(())
}

pub async fn release(cfg: &Config, address: &str) -> anyhow::Result<()> {
    let msg: String = allocator(cfg).await?.release(address).await?;
    print::print(&msg);
    Ok(())
}
