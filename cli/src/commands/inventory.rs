use colored::*;

use ipalloc_common::config::Config;
use ipalloc_common::record::{AddressRecord, RecordFilter};
use ipalloc_core::store::InventoryStore;

use crate::commands::connect_store;
use crate::terminal::print;

pub async fn inventory(cfg: &Config, segment: Option<String>) -> anyhow::Result<()> {
    let store = connect_store(cfg).await?;
    let filter = match segment {
        Some(name) => RecordFilter::by_segment(name),
        None => RecordFilter::default(),
    };

    let records: Vec<AddressRecord> = store.find_all(&filter).await?;
    if records.is_empty() {
        print::header("no records");
        return Ok(());
    }

    print::header("inventory");
    for (idx, record) in records.iter().enumerate() {
        print_record(idx, record);
    }
    print::fat_separator();

    let reserved = records.iter().filter(|r| r.reserved).count();
    let available = records.iter().filter(|r| r.is_available()).count();
    print::aligned_line("Records", records.len());
    print::aligned_line("Reserved", reserved);
    print::aligned_line("Available", available.to_string().green().bold());
    Ok(())
}

fn print_record(idx: usize, record: &AddressRecord) {
    let ptr: ColoredString = if record.ptr_name.is_empty() {
        "-".dimmed()
    } else {
        record.ptr_name.normal()
    };
    let alive: ColoredString = if record.alive {
        "yes".green()
    } else {
        "no".normal()
    };

    print::tree(
        idx,
        &record.address,
        &[
            ("Segment", record.segment_name.normal()),
            ("Network", record.network.normal()),
            ("CIDR", record.cidr.normal()),
            ("Alive", alive),
            ("Reserved", print::flag(record.reserved)),
            ("Locked", print::flag(record.locked)),
            ("PTR", ptr),
        ],
    );
}
